//! The main entry point for the `sitefix` command-line application.
//!
//! This file is responsible for parsing command-line arguments and dispatching
//! to the appropriate subcommand handler in the `sitefix` library.

use sitefix::cli::{self, Commands};
use sitefix::errors::Result;
use sitefix::{checker, rewriter};
use std::env;
use std::process;

/// The main function of the application.
///
/// It parses arguments, executes the corresponding command, and derives the
/// process exit code: a run with per-file errors, or a `check` with
/// `--fail-on-match` hits, exits non-zero.
fn main() -> Result<()> {
    // Check if no arguments provided (just 'sitefix')
    let args_vec: Vec<String> = env::args().collect();
    if args_vec.len() == 1 {
        println!("🔧 Idempotent batch rewriter for static site maintenance\n");
        println!("QUICK START EXAMPLES:");
        println!("  sitefix rewrite -d site/ --preset smart-punctuation  # Fix typographic punctuation");
        println!("  sitefix rewrite -d site/ -p '#1e3a8a' -r '#2c3e50'   # Simple replacement");
        println!("  sitefix rewrite -d site/ -c fixes.yaml --dry-run     # Preview a pipeline");
        println!("  sitefix check -d site/ -p leftovers.yaml             # Verify patterns are gone");
        println!("  sitefix undo -d site/                                # Restore from backups\n");
        println!("Run 'sitefix --help' for full command list");
        println!("Run 'sitefix <command> --help' for detailed command help");
        process::exit(0);
    }

    // Check for specific commands with missing args and show examples
    if args_vec.len() == 2 {
        match args_vec[1].as_str() {
            "rewrite" => {
                eprintln!("Error: Missing required argument: --dir <DIR>\n");
                eprintln!("USAGE EXAMPLES:");
                eprintln!("  sitefix rewrite -d site/ --preset smart-punctuation  # Built-in cleanup");
                eprintln!("  sitefix rewrite -d site/ -p '#1e3a8a' -r '#2c3e50'   # Simple replacement");
                eprintln!("  sitefix rewrite -d site/ -c fixes.yaml --dry-run     # Preview changes");
                eprintln!("  sitefix rewrite -d site/ -c fixes.yaml --backup      # Keep .bak copies");
                eprintln!("\nFor more options: sitefix rewrite --help");
                process::exit(1);
            }
            "check" => {
                eprintln!("Error: Missing required argument: --dir <DIR>\n");
                eprintln!("USAGE EXAMPLES:");
                eprintln!("  sitefix check -d site/                         # Use patterns.yaml");
                eprintln!("  sitefix check -d site/ -p leftovers.yaml --summary");
                eprintln!("  sitefix check -d site/ -f json -o report.json  # Machine-readable report");
                eprintln!("  sitefix check -d site/ --fail-on-match         # Gate a deploy script");
                eprintln!("\nFor more options: sitefix check --help");
                process::exit(1);
            }
            "undo" => {
                eprintln!("Error: Missing required argument: --dir <DIR>\n");
                eprintln!("USAGE EXAMPLES:");
                eprintln!("  sitefix undo -d .                    # Restore all files");
                eprintln!("  sitefix undo -d site/ --keep-backups # Restore but keep .bak files");
                eprintln!("\nFor more options: sitefix undo --help");
                process::exit(1);
            }
            "clean-backups" => {
                eprintln!("Error: Missing required argument: --dir <DIR>\n");
                eprintln!("USAGE EXAMPLES:");
                eprintln!("  sitefix clean-backups -d .            # Remove all backup files");
                eprintln!("  sitefix clean-backups -d . --dry-run  # Preview what would be deleted");
                eprintln!("\nFor more options: sitefix clean-backups --help");
                process::exit(1);
            }
            _ => {}
        }
    }

    let args = cli::parse_args();

    match args.command {
        Commands::Rewrite {
            preset,
            config,
            pattern,
            replacement,
            dir,
            extensions,
            exclude,
            backup,
            dry_run,
            verbose,
            workers,
        } => {
            let report = rewriter::run_rewrite(
                preset,
                config,
                pattern,
                replacement,
                dir,
                extensions,
                exclude,
                backup,
                dry_run,
                verbose,
                workers,
            )?;
            if report.has_errors() {
                process::exit(1);
            }
            Ok(())
        }
        Commands::Check {
            patterns,
            dir,
            output,
            extensions,
            exclude,
            format,
            include_summary,
            fail_on_match,
            workers,
        } => {
            let report = checker::run_check(
                patterns,
                dir,
                output,
                extensions,
                exclude,
                format,
                include_summary,
                workers,
            )?;
            if report.has_errors() || (fail_on_match && !report.matches.is_empty()) {
                process::exit(1);
            }
            Ok(())
        }
        Commands::Undo { dir, keep_backups } => rewriter::run_undo(dir, keep_backups),
        Commands::CleanBackups { dir, dry_run } => rewriter::run_clean_backups(dir, dry_run),
    }
}
