//! Music Indexer - turns folders of audio files into a music library.
//!
//! Files are enumerated through a media index, enriched by a cache and a
//! full tag read, and grouped into songs, albums, artists and genres. The
//! [`indexer`] coordinates loads and reports progress; the CLI drives it
//! headless.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod indexer;
pub mod library;
pub mod metadata;
pub mod model;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("music_indexer=info".parse()?))
        .init();

    cli::run_command(&args)
}
