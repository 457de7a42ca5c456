use crate::transform::{RuleWarning, TransformHit};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::PathBuf;

/// What happened to a single file during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The pipeline produced different text and it was (or would be) written.
    Modified,
    /// The pipeline produced identical text; the file was not touched.
    Unchanged,
    /// The file was not eligible for rewriting (binary content, unreadable).
    Skipped,
    /// Reading or writing the file failed after it was selected.
    Error,
}

/// The full result of processing one file, as recorded into a `RunReport`.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Per-transform match counts, in pipeline order.
    pub hits: Vec<TransformHit>,
    pub bytes_before: u64,
    pub bytes_after: u64,
    /// Soft rule warnings (missing anchors, orphaned region markers).
    pub warnings: Vec<RuleWarning>,
    /// Skip reason or error message.
    pub detail: Option<String>,
}

impl FileOutcome {
    pub fn modified(
        path: PathBuf,
        hits: Vec<TransformHit>,
        warnings: Vec<RuleWarning>,
        bytes_before: u64,
        bytes_after: u64,
    ) -> Self {
        Self {
            path,
            status: FileStatus::Modified,
            hits,
            bytes_before,
            bytes_after,
            warnings,
            detail: None,
        }
    }

    pub fn unchanged(path: PathBuf, warnings: Vec<RuleWarning>) -> Self {
        Self {
            path,
            status: FileStatus::Unchanged,
            hits: Vec::new(),
            bytes_before: 0,
            bytes_after: 0,
            warnings,
            detail: None,
        }
    }

    pub fn skipped(path: PathBuf, reason: impl Into<String>) -> Self {
        Self {
            path,
            status: FileStatus::Skipped,
            hits: Vec::new(),
            bytes_before: 0,
            bytes_after: 0,
            warnings: Vec::new(),
            detail: Some(reason.into()),
        }
    }

    pub fn error(path: PathBuf, message: impl Into<String>) -> Self {
        Self {
            path,
            status: FileStatus::Error,
            hits: Vec::new(),
            bytes_before: 0,
            bytes_after: 0,
            warnings: Vec::new(),
            detail: Some(message.into()),
        }
    }
}

/// Byte and edit accounting for one modified file.
#[derive(Debug, Clone, Copy)]
pub struct ModifiedDetail {
    pub edits: usize,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Aggregated results for a whole run.
///
/// Summary lists are always complete; nothing is elided for length.
#[derive(Debug)]
pub struct RunReport {
    pub files_scanned: usize,
    /// Modified paths with their accounting, sorted for stable output.
    pub modified: BTreeMap<PathBuf, ModifiedDetail>,
    pub unchanged: BTreeSet<PathBuf>,
    pub skipped: BTreeMap<PathBuf, String>,
    pub errors: BTreeMap<PathBuf, String>,
    pub warnings: Vec<(PathBuf, RuleWarning)>,
    /// Hit totals per transform, kept in pipeline order.
    pub transform_totals: Vec<(String, usize)>,
    pub total_edits: usize,
    pub dry_run: bool,
}

impl RunReport {
    /// Creates an empty report for a run over the named transforms.
    pub fn new(transform_names: Vec<String>, dry_run: bool) -> Self {
        Self {
            files_scanned: 0,
            modified: BTreeMap::new(),
            unchanged: BTreeSet::new(),
            skipped: BTreeMap::new(),
            errors: BTreeMap::new(),
            warnings: Vec::new(),
            transform_totals: transform_names.into_iter().map(|n| (n, 0)).collect(),
            total_edits: 0,
            dry_run,
        }
    }

    /// Folds one file's outcome into the run totals.
    pub fn record(&mut self, outcome: FileOutcome) {
        self.files_scanned += 1;
        for warning in &outcome.warnings {
            self.warnings.push((outcome.path.clone(), warning.clone()));
        }
        match outcome.status {
            FileStatus::Modified => {
                let edits: usize = outcome.hits.iter().map(|h| h.count).sum();
                for hit in &outcome.hits {
                    if let Some(slot) = self
                        .transform_totals
                        .iter_mut()
                        .find(|(name, _)| name == &hit.name)
                    {
                        slot.1 += hit.count;
                    }
                }
                self.total_edits += edits;
                self.modified.insert(
                    outcome.path,
                    ModifiedDetail {
                        edits,
                        bytes_before: outcome.bytes_before,
                        bytes_after: outcome.bytes_after,
                    },
                );
            }
            FileStatus::Unchanged => {
                self.unchanged.insert(outcome.path);
            }
            FileStatus::Skipped => {
                let reason = outcome.detail.unwrap_or_else(|| "skipped".to_string());
                self.skipped.insert(outcome.path, reason);
            }
            FileStatus::Error => {
                let message = outcome.detail.unwrap_or_else(|| "unknown error".to_string());
                self.errors.insert(outcome.path, message);
            }
        }
    }

    /// True when at least one file failed. The process exit code is derived
    /// from this; rule warnings never make a run fail.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Renders the end-of-run summary block.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "\n{}", "-".repeat(50));
        let _ = writeln!(out, "Files scanned   : {}", self.files_scanned);
        let _ = writeln!(out, "Files changed   : {}", self.modified.len());
        let _ = writeln!(out, "Files unchanged : {}", self.unchanged.len());
        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Files skipped   : {}", self.skipped.len());
        }
        if !self.errors.is_empty() {
            let _ = writeln!(out, "Files errored   : {}", self.errors.len());
        }
        let _ = writeln!(out, "Total edits     : {}", self.total_edits);

        if self.total_edits > 0 || verbose {
            let _ = writeln!(out, "\nEdits by transform:");
            for (name, count) in &self.transform_totals {
                if *count > 0 || verbose {
                    let _ = writeln!(out, "  {name}: {count}");
                }
            }
        }

        if !self.modified.is_empty() {
            let _ = writeln!(out, "\nChanged files:");
            for (path, detail) in &self.modified {
                if verbose {
                    let delta = detail.bytes_after as i64 - detail.bytes_before as i64;
                    let _ = writeln!(
                        out,
                        "  {} ({} edits, {:+} bytes)",
                        path.display(),
                        detail.edits,
                        delta
                    );
                } else {
                    let _ = writeln!(out, "  {}", path.display());
                }
            }
        }

        if verbose && !self.unchanged.is_empty() {
            let _ = writeln!(out, "\nUnchanged files:");
            for path in &self.unchanged {
                let _ = writeln!(out, "  {}", path.display());
            }
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "\nSkipped files:");
            for (path, reason) in &self.skipped {
                let _ = writeln!(out, "  {}: {}", path.display(), reason);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for (path, warning) in &self.warnings {
                let _ = writeln!(
                    out,
                    "  {}: [{}] {}",
                    path.display(),
                    warning.transform,
                    warning.message
                );
            }
        }

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for (path, message) in &self.errors {
                let _ = writeln!(out, "  {}: {}", path.display(), message);
            }
        }

        if self.dry_run {
            let _ = writeln!(out, "\nDRY RUN - no files were written");
        }

        out
    }
}
