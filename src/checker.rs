use crate::config::{ConfigLoader, NamedPattern};
use crate::errors::Result;
use crate::output::{OutputFormat, OutputFormatter};
use crate::rewriter;
use rayon::prelude::*;
use regex::{Regex, RegexSet};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The engine for verifying that patterns no longer occur in a tree.
///
/// A `Checker` is initialized with a set of named patterns. It uses a
/// `RegexSet` to test every line against all patterns at once, and then
/// confirms hits with the individual `Regex` objects.
pub struct Checker {
    patterns: Vec<(String, Regex)>,
    pattern_set: RegexSet,
}

/// A single occurrence of a matched pattern in a file.
#[derive(Debug, Clone)]
pub struct Match {
    /// The name of the pattern that was matched.
    pub pattern_name: String,
    /// The path to the file where the match was found.
    pub file_path: PathBuf,
    /// The 1-based line number of the match.
    pub line_number: usize,
    /// The content of the line that contained the match.
    pub line_content: String,
}

/// Aggregated results for a whole check run.
///
/// Matches and per-file failures are carried side by side: a file that
/// could not be read does not stop the run, but it is never dropped from
/// the result either. `main` derives the exit code from both.
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Every confirmed match, sorted by path and line.
    pub matches: Vec<Match>,
    /// Files that were selected but could not be checked.
    pub errors: BTreeMap<PathBuf, String>,
}

impl CheckReport {
    /// True when at least one selected file failed. Failures make the run
    /// exit nonzero regardless of `--fail-on-match`.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Checker {
    /// Compiles a list of named patterns into a checker.
    pub fn new(patterns: Vec<NamedPattern>) -> Result<Self> {
        let mut pattern_strings = Vec::new();
        let mut compiled = Vec::new();

        for p in patterns {
            pattern_strings.push(p.pattern.clone());
            compiled.push((p.name, Regex::new(&p.pattern)?));
        }

        let pattern_set = RegexSet::new(&pattern_strings)?;

        Ok(Self {
            patterns: compiled,
            pattern_set,
        })
    }

    /// Checks a single file for all configured patterns.
    ///
    /// Lines are decoded lossily, so invalid UTF-8 never fails a file.
    /// Files that look binary (a NUL byte in the first 1024 bytes) produce
    /// no matches.
    pub fn check_file(&self, path: &Path) -> Result<Vec<Match>> {
        let mut matches = Vec::new();
        let file_content = fs::read(path)?;

        // Basic binary detection: check for null bytes in the first 1024 bytes
        if file_content.iter().take(1024).any(|&b| b == 0) {
            return Ok(matches);
        }

        for (idx, line_bytes) in file_content.split(|&b| b == b'\n').enumerate() {
            let line_str = String::from_utf8_lossy(line_bytes);
            for pattern_idx in self.pattern_set.matches(&line_str) {
                let (name, regex) = &self.patterns[pattern_idx];
                if regex.is_match(&line_str) {
                    matches.push(Match {
                        pattern_name: name.clone(),
                        file_path: path.to_path_buf(),
                        line_number: idx + 1,
                        line_content: line_str.trim_end_matches('\r').to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }

    /// Checks a directory sequentially.
    ///
    /// Files are selected with the same enumeration the rewriter uses, so
    /// a tree checks exactly what a rewrite would touch. For large trees,
    /// `check_files` distributes the work across a thread pool and is
    /// significantly faster.
    pub fn check_directory(&self, dir: &Path, extensions: &[String]) -> Result<CheckReport> {
        let mut report = CheckReport::default();

        for path in rewriter::collect_files(dir, extensions, &[])? {
            match self.check_file(&path) {
                Ok(matches) => report.matches.extend(matches),
                Err(e) => {
                    report.errors.insert(path, e.to_string());
                }
            }
        }

        sort_matches(&mut report.matches);
        Ok(report)
    }

    /// Checks a list of files on a Rayon thread pool with a progress bar.
    ///
    /// A file that cannot be read is reported to stderr and recorded in
    /// the report's error map; it does not stop the run. Matches are
    /// sorted by path and line so repeated runs over the same tree produce
    /// identical output.
    pub fn check_files(&self, files: &[PathBuf], workers: Option<usize>) -> Result<CheckReport> {
        use indicatif::{ProgressBar, ProgressStyle};

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.unwrap_or_else(num_cpus::get))
            .build()?;

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let report: Mutex<CheckReport> = Mutex::new(CheckReport::default());

        pool.install(|| {
            files.par_iter().for_each(|path| {
                pb.inc(1);
                pb.set_message(format!("Checking: {}", path.display()));
                match self.check_file(path) {
                    Ok(matches) => {
                        if !matches.is_empty() {
                            report.lock().unwrap().matches.extend(matches);
                        }
                    }
                    Err(e) => {
                        eprintln!("Error checking {}: {}", path.display(), e);
                        report
                            .lock()
                            .unwrap()
                            .errors
                            .insert(path.clone(), e.to_string());
                    }
                }
            });
        });

        pb.finish_and_clear();

        let mut report = report.into_inner().unwrap();
        sort_matches(&mut report.matches);
        Ok(report)
    }
}

/// Orders matches by file, then line. The sort is stable, so matches on
/// the same line keep pattern order.
fn sort_matches(matches: &mut [Match]) {
    matches.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then(a.line_number.cmp(&b.line_number))
    });
}

/// The main entry point for the `check` command.
///
/// This function handles:
/// 1. Loading the named patterns from a configuration file.
/// 2. Collecting eligible files with the enumeration the rewriter uses.
/// 3. Checking the files in parallel.
/// 4. Writing the results to a file or stdout in the selected format.
///
/// Returns the full report so the caller can derive the exit code from
/// the match count under `--fail-on-match` and from per-file errors.
pub fn run_check(
    patterns_file: PathBuf,
    dir: PathBuf,
    output: Option<PathBuf>,
    extensions: Vec<String>,
    exclude: Vec<String>,
    format: String,
    include_summary: bool,
    workers: Option<usize>,
) -> Result<CheckReport> {
    let resolved_path = ConfigLoader::find_config(&patterns_file, &dir)?;
    let cfg = ConfigLoader::load_check_config(&resolved_path)?;
    if cfg.patterns.is_empty() {
        return Err("The patterns file defines no patterns".into());
    }

    let checker = Checker::new(cfg.patterns)?;
    let files = rewriter::collect_files(&dir, &extensions, &exclude)?;
    let report = checker.check_files(&files, workers)?;

    let mut writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };

    let formatter = OutputFormatter::new(OutputFormat::from(format.as_str()), include_summary);
    formatter.write_output(&mut writer, &report)?;
    writer.flush()?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pattern(name: &str, pattern: &str) -> NamedPattern {
        NamedPattern {
            name: name.into(),
            pattern: pattern.into(),
        }
    }

    #[test]
    fn finds_each_named_pattern_once() {
        let patterns = vec![
            pattern("leftover_reviews", r"Leave a Review"),
            pattern("old_analytics", r"G-OLDID\d+"),
            pattern("navy_header", r"#1e3a8a"),
        ];
        let checker = Checker::new(patterns).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("page.html");
        let content = "<a>Leave a Review</a>\n<script>G-OLDID123</script>\n<style>#1e3a8a</style>\n<p>clean</p>\n";
        fs::write(&test_file, content).unwrap();

        let matches = checker.check_file(&test_file).unwrap();

        assert_eq!(matches.len(), 3);
        assert!(matches.iter().any(|m| m.pattern_name == "leftover_reviews"));
        assert!(matches.iter().any(|m| m.pattern_name == "old_analytics"));
        assert!(matches.iter().any(|m| m.pattern_name == "navy_header"));
    }

    #[test]
    fn line_numbers_are_one_based() {
        let checker = Checker::new(vec![pattern("hit", "needle")]).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("page.html");
        fs::write(&test_file, "needle on line one\nnothing\nneedle again\n").unwrap();

        let matches = checker.check_file(&test_file).unwrap();
        let lines: Vec<usize> = matches.iter().map(|m| m.line_number).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn binary_file_produces_no_matches() {
        let checker = Checker::new(vec![pattern("hit", "needle")]).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("blob.html");
        fs::write(&test_file, b"needle\x00needle").unwrap();

        assert!(checker.check_file(&test_file).unwrap().is_empty());
    }

    #[test]
    fn crlf_lines_are_reported_without_carriage_return() {
        let checker = Checker::new(vec![pattern("hit", "needle")]).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let test_file = temp_dir.path().join("page.html");
        fs::write(&test_file, "a needle here\r\nplain\r\n").unwrap();

        let matches = checker.check_file(&test_file).unwrap();
        assert_eq!(matches[0].line_content, "a needle here");
    }

    #[test]
    fn parallel_check_matches_sequential_check() {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..10 {
            let content = format!("stale marker in file {i}\n");
            fs::write(temp_dir.path().join(format!("file{i}.html")), content).unwrap();
        }

        let checker = Checker::new(vec![pattern("stale", "stale marker")]).unwrap();

        let sequential = checker.check_directory(temp_dir.path(), &[]).unwrap();

        let files: Vec<PathBuf> = (0..10)
            .map(|i| temp_dir.path().join(format!("file{i}.html")))
            .collect();
        let parallel = checker.check_files(&files, Some(4)).unwrap();

        assert_eq!(sequential.matches.len(), 10);
        assert_eq!(sequential.matches.len(), parallel.matches.len());
        for (s, p) in sequential.matches.iter().zip(parallel.matches.iter()) {
            assert_eq!(s.file_path, p.file_path);
            assert_eq!(s.line_number, p.line_number);
        }
    }

    #[test]
    fn read_failure_is_recorded_and_run_continues() {
        let temp_dir = TempDir::new().unwrap();
        let good = temp_dir.path().join("good.html");
        fs::write(&good, "stale marker\n").unwrap();
        let missing = temp_dir.path().join("missing.html");

        let checker = Checker::new(vec![pattern("stale", "stale marker")]).unwrap();
        let report = checker.check_files(&[missing.clone(), good], None).unwrap();

        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].pattern_name, "stale");
        assert!(report.has_errors());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors.contains_key(&missing));
    }

    #[test]
    fn nonexistent_root_is_a_fatal_error() {
        let temp_dir = TempDir::new().unwrap();
        let patterns_path = temp_dir.path().join("patterns.yaml");
        fs::write(
            &patterns_path,
            "patterns:\n  - name: stale\n    pattern: 'stale marker'\n",
        )
        .unwrap();

        let result = run_check(
            patterns_path,
            temp_dir.path().join("no-such-dir"),
            None,
            vec![],
            vec![],
            "text".to_string(),
            false,
            None,
        );

        assert!(result.is_err());
    }

    #[test]
    fn excluded_dirs_are_not_checked() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("page.html"), "BANNED\n").unwrap();
        fs::create_dir(temp_dir.path().join("vendor")).unwrap();
        fs::write(temp_dir.path().join("vendor/dep.html"), "BANNED\n").unwrap();

        let patterns_path = temp_dir.path().join("patterns.yaml");
        fs::write(
            &patterns_path,
            "patterns:\n  - name: banned\n    pattern: 'BANNED'\n",
        )
        .unwrap();

        let report = run_check(
            patterns_path,
            temp_dir.path().to_path_buf(),
            Some(temp_dir.path().join("out.txt")),
            vec!["html".to_string()],
            vec!["vendor".to_string()],
            "text".to_string(),
            false,
            None,
        )
        .unwrap();

        assert_eq!(report.matches.len(), 1);
        assert!(report.matches[0].file_path.ends_with("page.html"));
        assert!(!report.has_errors());
    }
}
