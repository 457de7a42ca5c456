use crate::cli::Preset;
use crate::config::ConfigLoader;
use crate::errors::Result;
use crate::presets;
use crate::report::{FileOutcome, RunReport};
use crate::transform::{MatchFlags, Pipeline, Transform};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// Core engine for rewriting files with a transform pipeline.
///
/// A `Rewriter` holds a compiled `Pipeline` and applies it to one file at a
/// time. Deciding which files to visit and aggregating outcomes belong to
/// the run functions below.
pub struct Rewriter {
    pipeline: Pipeline,
}

/// Options for processing a file.
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// If `true`, a `.bak` file is created before a file is modified.
    pub backup: bool,
    /// If `true`, changes are computed and reported but never written.
    pub dry_run: bool,
}

/// Statistics from an `undo` operation.
pub struct UndoStats {
    /// The number of backup files found.
    pub found: usize,
    /// The number of files successfully restored from backups.
    pub restored: usize,
}

impl Rewriter {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// Names of the pipeline's transforms, in application order.
    pub fn transform_names(&self) -> Vec<String> {
        self.pipeline.names()
    }

    /// Processes a single file through the pipeline.
    ///
    /// The file is read as raw bytes and decoded lossily, so invalid UTF-8
    /// never fails a file; bad sequences become U+FFFD. Files that look
    /// binary (a NUL byte in the first 1024 bytes) are skipped untouched.
    ///
    /// The rewritten text is compared against the original and the file is
    /// only written when they differ, so an unchanged file keeps its inode,
    /// mtime, and permissions. Writes go through a temp file in the same
    /// directory and are persisted atomically.
    ///
    /// Errors from this function are per-file: the caller records them and
    /// moves on to the next file.
    pub fn process_file(&self, path: &Path, options: &ProcessOptions) -> Result<FileOutcome> {
        let bytes = fs::read(path)?;

        if bytes.iter().take(1024).any(|&b| b == 0) {
            return Ok(FileOutcome::skipped(path.to_path_buf(), "binary content"));
        }

        let original = String::from_utf8_lossy(&bytes).into_owned();
        let result = self.pipeline.apply(&original);

        let rewritten = match result.text {
            Some(text) if text != original => text,
            _ => return Ok(FileOutcome::unchanged(path.to_path_buf(), result.warnings)),
        };

        let bytes_before = bytes.len() as u64;
        let bytes_after = rewritten.len() as u64;

        if !options.dry_run {
            if options.backup {
                let backup_path = format!("{}.bak", path.display());
                fs::copy(path, &backup_path)?;
            }

            // Write atomically using tempfile
            if let Some(parent) = path.parent() {
                let mut temp_file = NamedTempFile::new_in(parent)?;
                temp_file.write_all(rewritten.as_bytes())?;

                // Preserve file permissions
                let perms = fs::metadata(path)?.permissions();
                fs::set_permissions(temp_file.path(), perms)?;

                temp_file.persist(path)?;
            } else {
                return Err(
                    format!("Could not get parent directory for {}", path.display()).into(),
                );
            }
        }

        Ok(FileOutcome::modified(
            path.to_path_buf(),
            result.hits,
            result.warnings,
            bytes_before,
            bytes_after,
        ))
    }

    /// Scans a directory for `.bak` files and restores them.
    ///
    /// # Arguments
    ///
    /// * `dir` - The directory to scan for backup files.
    /// * `keep_backups` - If `false`, the `.bak` files are deleted after
    ///   being restored.
    pub fn undo(dir: &Path, keep_backups: bool) -> Result<UndoStats> {
        let mut found = 0;
        let mut restored = 0;

        for entry in WalkBuilder::new(dir).build() {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("bak") {
                found += 1;
                let original_path = path.with_extension("");
                fs::copy(path, &original_path)?;
                if !keep_backups {
                    fs::remove_file(path)?;
                }
                restored += 1;
                println!("Restored {}", original_path.display());
            }
        }

        Ok(UndoStats { found, restored })
    }
}

/// Directory names that are never visited: dependency and build output
/// trees have no hand-maintained pages in them.
const SKIP_DIRS: &[&str] = &["node_modules", "dist", "build", "target"];

/// Walks `dir` and returns every file the run should visit, sorted.
///
/// Standard ignore filters apply (`.gitignore`, hidden files such as
/// `.git`), `SKIP_DIRS` and excluded directory names are pruned wherever
/// they appear below the root, `.bak` files are never visited, and only the
/// requested extensions are kept. Exclusion looks at path components below
/// the root only, so a root that itself lives under a `build/` checkout is
/// still walked. Sorting makes runs deterministic regardless of filesystem
/// order.
pub fn collect_files(dir: &Path, extensions: &[String], exclude: &[String]) -> Result<Vec<PathBuf>> {
    let exts: Vec<String> = extensions
        .iter()
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .collect();

    let mut files = Vec::new();
    let mut walker = WalkBuilder::new(dir);
    walker.standard_filters(true); // Respect .gitignore

    for entry in walker.build() {
        let entry = entry?;
        let path = entry.path();

        let rel = path.strip_prefix(dir).unwrap_or(path);
        let should_exclude = rel.components().any(|c| {
            let name = c.as_os_str();
            SKIP_DIRS.iter().any(|d| name == *d)
                || exclude.iter().any(|ex| name == ex.as_str())
        });
        if should_exclude || !path.is_file() {
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) == Some("bak") {
            continue;
        }
        if should_process_file(path, &exts) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// The main entry point for the `rewrite` command.
///
/// This function orchestrates the entire run:
/// 1. It builds the pipeline from a preset, a config file, or command-line
///    arguments.
/// 2. It walks the target directory to find all files to be processed.
/// 3. It processes the files, sequentially by default or on a Rayon thread
///    pool when `--workers` is given.
/// 4. It prints the summary and returns the report so the caller can derive
///    the exit code.
pub fn run_rewrite(
    preset: Option<Preset>,
    config_file: Option<PathBuf>,
    pattern: Option<String>,
    replacement: Option<String>,
    dir: PathBuf,
    extensions: Vec<String>,
    exclude: Vec<String>,
    backup: bool,
    dry_run: bool,
    verbose: bool,
    workers: Option<usize>,
) -> Result<RunReport> {
    // Build the pipeline from one of the three sources
    let (pipeline, cfg_extensions, cfg_exclude) = if let Some(preset_type) = preset {
        // Use built-in preset
        println!("Using preset: {preset_type:?}");
        (Pipeline::new(presets::load_preset(&preset_type)?), None, None)
    } else if let Some(cfg_path) = config_file {
        // Use config file
        let resolved_path = ConfigLoader::find_config(&cfg_path, &dir)?;
        println!("Using config file: {}", resolved_path.display());
        let config = ConfigLoader::load_pipeline_config(&resolved_path)?;
        let pipeline = config.compile()?;
        (pipeline, config.extensions, config.exclude)
    } else if let Some(pat) = pattern {
        // Use single pattern/replacement; a missing replacement deletes matches
        let replacement = replacement.unwrap_or_default();
        (
            Pipeline::new(vec![Transform::replace(
                "pattern",
                &pat,
                &replacement,
                MatchFlags::default(),
            )?]),
            None,
            None,
        )
    } else {
        return Err("Specify --preset, --config, or --pattern".into());
    };

    if pipeline.is_empty() {
        return Err("The pipeline defines no transforms".into());
    }

    let exts = cfg_extensions.unwrap_or(extensions);
    let exclude_dirs = cfg_exclude.unwrap_or(exclude);

    let files = collect_files(&dir, &exts, &exclude_dirs)?;

    let rewriter = Rewriter::new(pipeline);
    let options = ProcessOptions { backup, dry_run };

    let report = if let Some(num_workers) = workers {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build()?;
        let report = Mutex::new(RunReport::new(rewriter.transform_names(), dry_run));
        pool.install(|| {
            files.par_iter().for_each(|path| {
                let outcome = outcome_for(&rewriter, path, &options);
                log_outcome(&outcome, dry_run);
                report.lock().unwrap().record(outcome);
            });
        });
        report.into_inner().unwrap()
    } else {
        let mut report = RunReport::new(rewriter.transform_names(), dry_run);
        for path in &files {
            let outcome = outcome_for(&rewriter, path, &options);
            log_outcome(&outcome, dry_run);
            report.record(outcome);
        }
        report
    };

    print!("{}", report.render(verbose));

    Ok(report)
}

/// Processes one file, containing any failure as a per-file error outcome.
fn outcome_for(rewriter: &Rewriter, path: &Path, options: &ProcessOptions) -> FileOutcome {
    match rewriter.process_file(path, options) {
        Ok(outcome) => outcome,
        Err(e) => FileOutcome::error(path.to_path_buf(), e.to_string()),
    }
}

/// Prints the live per-file line for interesting outcomes.
fn log_outcome(outcome: &FileOutcome, dry_run: bool) {
    use crate::report::FileStatus;
    match outcome.status {
        FileStatus::Modified => {
            let edits: usize = outcome.hits.iter().map(|h| h.count).sum();
            if dry_run {
                println!("DRY Modified {} ({} edits)", outcome.path.display(), edits);
            } else {
                println!("Modified {} ({} edits)", outcome.path.display(), edits);
            }
        }
        FileStatus::Skipped => {
            if let Some(reason) = &outcome.detail {
                println!("Skipped {} ({})", outcome.path.display(), reason);
            }
        }
        FileStatus::Error => {
            if let Some(message) = &outcome.detail {
                eprintln!("Error processing file {}: {}", outcome.path.display(), message);
            }
        }
        FileStatus::Unchanged => {}
    }
}

/// The main entry point for the `undo` command.
pub fn run_undo(dir: PathBuf, keep_backups: bool) -> Result<()> {
    let stats = Rewriter::undo(&dir, keep_backups)?;
    println!(
        "\nBackups found: {}, restored: {}",
        stats.found, stats.restored
    );
    Ok(())
}

/// The main entry point for the `clean-backups` command.
pub fn run_clean_backups(dir: PathBuf, dry_run: bool) -> Result<()> {
    let mut found = 0;
    let mut removed = 0;
    let mut total_size = 0u64;

    println!("Searching for backup files in {}...\n", dir.display());

    for entry in WalkBuilder::new(&dir).build() {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("bak") {
            found += 1;

            if let Ok(metadata) = path.metadata() {
                total_size += metadata.len();
            }

            if dry_run {
                println!("Would remove: {}", path.display());
            } else {
                match fs::remove_file(path) {
                    Ok(_) => {
                        removed += 1;
                        println!("Removed: {}", path.display());
                    }
                    Err(e) => {
                        eprintln!("Failed to remove {}: {}", path.display(), e);
                    }
                }
            }
        }
    }

    println!("\n{}", "-".repeat(50));
    if dry_run {
        println!("Backup files found: {found}");
        println!("Total size: {:.2} MB", total_size as f64 / 1_048_576.0);
        println!("\nRun without --dry-run to remove these files");
    } else {
        println!("Backup files found: {found}");
        println!("Backup files removed: {removed}");
        println!("Space freed: {:.2} MB", total_size as f64 / 1_048_576.0);
    }

    Ok(())
}

/// Determines if a file should be processed based on its extension.
fn should_process_file(path: &Path, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }

    path.extension()
        .and_then(|os| os.to_str())
        .map(|s| extensions.contains(&s.to_lowercase()))
        .unwrap_or(false)
}
