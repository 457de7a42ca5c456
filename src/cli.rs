use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the `sitefix` batch rewriter.
///
/// `sitefix` applies ordered transform pipelines to whole directory trees,
/// writes only the files whose content actually changes, and reports every
/// touched file. A read-only `check` mode verifies that unwanted patterns
/// are gone after a rewrite.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "🔧 Idempotent batch rewriter for static site maintenance",
    long_about = "sitefix - A batch rewriter and checker for static HTML trees.

Designed for repeated maintenance runs with:
  • Ordered transform pipelines
  • Write-only-on-change atomic rewrites
  • Gitignore awareness
  • Full, untruncated change reports
  • Optional parallel processing

QUICK EXAMPLES:
  sitefix rewrite -d site/ --preset smart-punctuation  # Fix typographic punctuation
  sitefix rewrite -d site/ -c fixes.yaml --dry-run     # Preview a pipeline
  sitefix check -d site/ -p leftovers.yaml --summary   # Verify nothing is left
  sitefix undo -d site/                                # Restore from backups

For detailed help on any command, use: sitefix <command> --help"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Pre-defined transform pipelines for common site cleanup tasks.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Preset {
    /// Replace typographic punctuation (smart quotes, dashes, ellipses) with ASCII.
    SmartPunctuation,
    /// Remove control characters, keeping tabs and line endings.
    StripControlChars,
    /// Remove trailing whitespace from every line.
    TrimTrailingWhitespace,
    /// Collapse runs of two or more blank lines down to one.
    CollapseBlankLines,
    /// Delete `<!-- ... -->` comment regions.
    StripHtmlComments,
    /// Lowercase hex color codes like `#2C3E50`.
    NormalizeHexCase,
}

/// The set of available commands for the `sitefix` CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Rewrite files with a transform pipeline (writes only changed files)
    ///
    /// EXAMPLES:
    ///   sitefix rewrite -d site/ --preset smart-punctuation  # Built-in cleanup
    ///   sitefix rewrite -d site/ -p '#1e3a8a' -r '#2c3e50'   # Single replacement
    ///   sitefix rewrite -d site/ -c fixes.yaml --dry-run     # Preview changes
    ///   sitefix rewrite -d site/ -c fixes.yaml --backup      # Keep .bak copies
    ///
    /// Config file format (fixes.yaml):
    ///   transforms:
    ///     - name: navy-header
    ///       replace:
    ///         pattern: 'background:\s*#1e3a8a'
    ///         replacement: 'background: #2c3e50'
    ///     - name: strip-reviews
    ///       delete_region:
    ///         start: '<!-- REVIEWS -->'
    ///         end: '<!-- /REVIEWS -->'
    ///
    /// Transforms run in the order they are declared.
    Rewrite {
        /// The name of a built-in preset pipeline to run.
        #[arg(long, value_enum)]
        preset: Option<Preset>,

        /// Path to a YAML configuration file defining the pipeline.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// A single regex pattern to search for.
        #[arg(short, long)]
        pattern: Option<String>,

        /// The string to replace the matched pattern with. Omit to delete matches.
        #[arg(short, long)]
        replacement: Option<String>,

        /// The directory to process.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// A comma-separated list of file extensions to include.
        #[arg(
            short = 'x',
            long = "ext",
            value_delimiter = ',',
            default_values_t = ["html".to_string(), "htm".to_string()]
        )]
        extensions: Vec<String>,

        /// A comma-separated list of directories to exclude.
        #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,

        /// Create a backup file (`.bak`) before modifying a file.
        #[arg(long)]
        backup: bool,

        /// Compute and report the changes without modifying any files.
        #[arg(long)]
        dry_run: bool,

        /// Print each modified file and list unchanged files in the summary.
        #[arg(short, long)]
        verbose: bool,

        /// Process files on this many parallel worker threads instead of sequentially.
        #[arg(short, long, env = "SITEFIX_WORKERS")]
        workers: Option<usize>,
    },

    /// Check files for leftover patterns (read-only)
    ///
    /// EXAMPLES:
    ///   sitefix check -d site/                         # Use patterns.yaml
    ///   sitefix check -d site/ -p leftovers.yaml --summary
    ///   sitefix check -d site/ -f json -o report.json  # Machine-readable report
    ///   sitefix check -d site/ --fail-on-match         # Gate a deploy script
    ///
    /// Pattern files use YAML format:
    ///   patterns:
    ///     - name: leftover_reviews
    ///       pattern: 'Leave a Review|review-section'
    ///     - name: old_analytics
    ///       pattern: 'G-OLDID123'
    Check {
        /// Path to the YAML file defining the named patterns.
        #[arg(short, long, default_value = "patterns.yaml")]
        patterns: PathBuf,

        /// The directory to check.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Path to the output file. If omitted, results are written to standard output.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// A comma-separated list of file extensions to include.
        #[arg(
            short = 'x',
            long = "ext",
            value_delimiter = ',',
            default_values_t = ["html".to_string(), "htm".to_string()]
        )]
        extensions: Vec<String>,

        /// A comma-separated list of directories to exclude.
        #[arg(short = 'e', long = "exclude", value_delimiter = ',')]
        exclude: Vec<String>,

        /// The output format for the results (`text`, `json`, or `csv`).
        #[arg(short = 'f', long = "format", default_value = "text")]
        format: String,

        /// Include a summary of check statistics in the output.
        #[arg(long = "summary")]
        include_summary: bool,

        /// Exit with a non-zero status if any pattern matches.
        #[arg(long)]
        fail_on_match: bool,

        /// The number of parallel worker threads to use. Defaults to the number of logical CPU cores.
        #[arg(short = 'w', long = "workers", env = "SITEFIX_WORKERS")]
        workers: Option<usize>,
    },

    /// Restore files from backups (undo rewrites)
    ///
    /// EXAMPLES:
    ///   sitefix undo -d .                    # Restore all files in current dir
    ///   sitefix undo -d site/ --keep-backups # Restore but keep .bak files
    Undo {
        /// The directory where the `rewrite` operation was run.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Keep the backup files after restoring the original files.
        #[arg(long)]
        keep_backups: bool,
    },

    /// Remove backup files without restoring
    ///
    /// EXAMPLES:
    ///   sitefix clean-backups -d . --dry-run  # Preview what would be deleted
    ///   sitefix clean-backups -d .            # Delete all .bak files
    CleanBackups {
        /// The directory to clean of backup files.
        #[arg(short, long, required = true)]
        dir: PathBuf,

        /// Preview which backup files would be removed without deleting them.
        #[arg(long)]
        dry_run: bool,
    },
}

/// Parses command-line arguments and returns the populated `Args` struct.
pub fn parse_args() -> Args {
    Args::parse()
}
