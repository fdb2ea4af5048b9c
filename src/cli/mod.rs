//! Command-line interface for music-indexer.
//!
//! Runs the indexing pipeline headless: one-shot loads, a watching mode that
//! reloads on change, and cache maintenance.

mod commands;

pub use commands::{Cli, Commands, run_command};
