//! `sitefix` is a library for idempotent batch rewriting of text file trees.
//!
//! It provides the core logic for the `sitefix` command-line tool but can also
//! be used as a standalone library. The main components are:
//!
//! - `Transform` and `Pipeline`: ordered rewriting rules applied as a single
//!   fold over each file's text.
//! - `Rewriter`: applies a pipeline to files, writing only the ones whose
//!   content actually changes, with optional backups and dry runs.
//! - `Checker`: a read-only verifier that reports every remaining occurrence
//!   of named patterns.
//! - `RunReport`: complete, untruncated accounting of a run, from which the
//!   process exit code is derived.
//! - `config`: loads pipeline and pattern definitions from YAML files.
//!
//! The library is designed for repeated maintenance runs: applying the same
//! pipeline twice leaves the tree byte-for-byte identical, and unchanged
//! files are never rewritten.

pub mod checker;
pub mod cli;
pub mod config;
pub mod errors;
pub mod output;
pub mod presets;
pub mod report;
pub mod rewriter;
pub mod transform;

// Re-export main types for easier access by library users.
pub use checker::{CheckReport, Checker, Match};
pub use errors::{Error, Result};
pub use output::{OutputFormat, OutputFormatter};
pub use report::{FileOutcome, FileStatus, RunReport};
pub use rewriter::{ProcessOptions, Rewriter};
pub use transform::{InsertPosition, MatchFlags, Pipeline, Transform};
