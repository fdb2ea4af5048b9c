//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `index`: loads, watching, and cache maintenance
//! - `settings`: saving defaults to the config file

mod index;
mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::error::Error;
use crate::extractor::MediaTier;

pub use index::{cmd_clear_cache, cmd_index};
pub use settings::cmd_save_config;

/// Music Indexer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Media index capability tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Legacy,
    Q,
    R,
}

impl From<TierArg> for MediaTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Legacy => MediaTier::Legacy,
            TierArg::Q => MediaTier::Q,
            TierArg::R => MediaTier::R,
        }
    }
}

/// Options shared by every command that loads the library
#[derive(Debug, clap::Args)]
pub struct LoadArgs {
    /// Music folders (defaults to library.paths from the config file)
    pub paths: Vec<PathBuf>,
    /// Tag cache database (defaults to library.cache_path, then the data directory)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Media index capability tier
    #[arg(long, value_enum)]
    pub tier: Option<TierArg>,
    /// Characters that split multi-value tags
    #[arg(long)]
    pub separators: Option<String>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Index music folders and print a summary of the library.
    /// Keeps watching if library.watch_for_changes is set.
    Index {
        #[command(flatten)]
        load: LoadArgs,
        /// Ignore cached tags and read every file
        #[arg(long)]
        no_cache: bool,
        /// List every album in the summary
        #[arg(short, long)]
        verbose: bool,
    },
    /// Index music folders, then reload whenever they change
    Watch {
        #[command(flatten)]
        load: LoadArgs,
    },
    /// Save music folders and options as defaults in the config file
    Config {
        #[command(flatten)]
        load: LoadArgs,
        /// Keep watching after `index` finishes its first load
        #[arg(long)]
        watch: Option<bool>,
    },
    /// Delete every cached tag record
    ClearCache {
        /// Tag cache database (defaults to library.cache_path, then the data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let rt = Runtime::new()?;
    let config = config::load();

    match &cli.command {
        Commands::Index {
            load,
            no_cache,
            verbose,
        } => cmd_index(&rt, resolve_config(config, load)?, !*no_cache, *verbose),
        Commands::Watch { load } => {
            let mut config = resolve_config(config, load)?;
            config.library.watch_for_changes = true;
            cmd_index(&rt, config, true, false)
        }
        Commands::Config { load, watch } => {
            let mut config = apply_overrides(config, load);
            if let Some(watch) = watch {
                config.library.watch_for_changes = *watch;
            }
            cmd_save_config(&config)
        }
        Commands::ClearCache { db } => cmd_clear_cache(&rt, &cache_path(&config, db.as_ref())),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Apply command-line overrides to the loaded config.
fn apply_overrides(mut config: Config, load: &LoadArgs) -> Config {
    if !load.paths.is_empty() {
        config.library.paths = load.paths.clone();
    }
    if let Some(tier) = load.tier {
        config.music.tier = tier.into();
    }
    if let Some(separators) = &load.separators {
        config.music.separators = separators.clone();
    }
    if let Some(db) = &load.db {
        config.library.cache_path = Some(db.clone());
    }
    config
}

/// Apply overrides and fill in everything a load needs.
fn resolve_config(config: Config, load: &LoadArgs) -> Result<Config, Error> {
    let mut config = apply_overrides(config, load);
    if config.library.paths.is_empty() {
        return Err(Error::config(format!(
            "No music folders given. Pass them as arguments or set library.paths in {}",
            config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "the config file".to_string())
        )));
    }
    config.library.cache_path = Some(cache_path(&config, None));
    Ok(config)
}

fn cache_path(config: &Config, db: Option<&PathBuf>) -> PathBuf {
    db.cloned()
        .or_else(|| config.library.cache_path.clone())
        .unwrap_or_else(config::default_cache_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_index_arguments() {
        let cli = parse(&["music-indexer", "index", "/music", "--no-cache", "--tier", "legacy"]);
        let Commands::Index { load, no_cache, .. } = cli.command else {
            panic!("expected index");
        };
        assert!(no_cache);
        assert_eq!(load.paths, vec![PathBuf::from("/music")]);
        assert_eq!(load.tier, Some(TierArg::Legacy));
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let load = LoadArgs {
            paths: vec![PathBuf::from("/music")],
            db: Some(PathBuf::from("/tmp/cache.db")),
            tier: Some(TierArg::Q),
            separators: Some(";".to_string()),
        };
        let config = resolve_config(Config::default(), &load).unwrap();
        assert_eq!(config.library.paths, vec![PathBuf::from("/music")]);
        assert_eq!(config.library.cache_path, Some(PathBuf::from("/tmp/cache.db")));
        assert_eq!(config.music.tier, MediaTier::Q);
        assert_eq!(config.music.separators, ";");
    }

    #[test]
    fn test_missing_paths_is_an_error() {
        let load = LoadArgs {
            paths: Vec::new(),
            db: None,
            tier: None,
            separators: None,
        };
        assert!(matches!(
            resolve_config(Config::default(), &load),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_config_command_arguments() {
        let cli = parse(&["music-indexer", "config", "/music", "--watch", "true"]);
        let Commands::Config { load, watch } = cli.command else {
            panic!("expected config");
        };
        assert_eq!(watch, Some(true));

        let config = apply_overrides(Config::default(), &load);
        assert_eq!(config.library.paths, vec![PathBuf::from("/music")]);
        assert_eq!(config.library.cache_path, None);
    }
}
