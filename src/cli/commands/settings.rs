//! Persisting command-line options as config defaults.

use crate::config::{self, Config};

/// Write `config` to the config file so later runs need no arguments
pub fn cmd_save_config(config: &Config) -> anyhow::Result<()> {
    let path = config::save(config)?;
    println!("Saved settings to {}", path.display());
    if config.library.paths.is_empty() {
        println!("No music folders set yet. Pass them as arguments to add some.");
    } else {
        for folder in &config.library.paths {
            println!("  {}", folder.display());
        }
    }
    Ok(())
}
