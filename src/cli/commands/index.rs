//! Library indexing and cache commands.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::info;

use crate::config::{self, Config};
use crate::db::SqliteCache;
use crate::indexer::service::IndexerService;
use crate::indexer::{IndexContext, Indexer, Indexing, Response, State};
use crate::library::Library;

/// Index and print a summary, then keep reloading on change if the library
/// is configured to watch
pub fn cmd_index(rt: &Runtime, config: Config, with_cache: bool, verbose: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let (indexer, service, cache) = start_service(&config).await?;
        let mut states = service.subscribe();
        let watcher = service.watch_if_enabled(&config.library)?;

        println!("Indexing {} folder(s)...", config.library.paths.len());
        indexer.request_reindex(with_cache);
        let response = next_response(&mut states).await?;

        let Some(watcher) = watcher else {
            service.shutdown();
            print_response(&response, verbose)?;
            if verbose {
                println!("Tag cache holds {} record(s).", cache.count().await?);
            }
            return Ok(());
        };

        if let Err(e) = print_response(&response, verbose) {
            eprintln!("! {e}");
        }
        println!("Watching for changes. Press Ctrl+C to stop.\n");

        loop {
            tokio::select! {
                response = next_response(&mut states) => {
                    if let Err(e) = print_response(&response?, false) {
                        eprintln!("! {e}");
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        watcher.abort();
        service.shutdown();
        info!(target: "cli", "Stopped watching");
        Ok(())
    })
}

/// Delete every cached tag record
pub fn cmd_clear_cache(rt: &Runtime, path: &Path) -> anyhow::Result<()> {
    rt.block_on(async {
        if !path.exists() {
            println!("No cache at {}", path.display());
            return Ok(());
        }
        let cache = SqliteCache::open(path).await?;
        let removed = cache.clear().await?;
        println!("Removed {removed} cached record(s) from {}", path.display());
        Ok(())
    })
}

async fn start_service(
    config: &Config,
) -> anyhow::Result<(Arc<Indexer>, Arc<IndexerService>, Arc<SqliteCache>)> {
    let cache_path = config
        .library
        .cache_path
        .clone()
        .unwrap_or_else(config::default_cache_path);
    let cache = Arc::new(SqliteCache::open(&cache_path).await?);
    info!(target: "cli", cache = %cache_path.display(), "Opened tag cache");

    let ctx = IndexContext::from_config(config, cache.clone());
    let indexer = Arc::new(Indexer::new());
    let service = IndexerService::start(indexer.clone(), ctx)?;
    Ok((indexer, service, cache))
}

/// Print progress until the next load completes.
async fn next_response(states: &mut watch::Receiver<Option<State>>) -> anyhow::Result<Response> {
    loop {
        states.changed().await?;
        let state = states.borrow_and_update().clone();
        match state {
            Some(State::Indexing(Indexing::Songs { current, total })) => {
                print!("\rIndexed {current}/{total} songs...");
                std::io::stdout().flush()?;
            }
            Some(State::Indexing(Indexing::Indeterminate)) | None => {}
            Some(State::Complete(response)) => {
                println!();
                return Ok(response);
            }
        }
    }
}

fn print_response(response: &Response, verbose: bool) -> anyhow::Result<()> {
    match response {
        Response::Ok(library) => {
            println!(
                "Indexed {} songs in {} albums by {} artists across {} genres.",
                library.songs().len(),
                library.albums().len(),
                library.artists().len(),
                library.genres().len()
            );
            if verbose {
                print_albums(library);
            }
            Ok(())
        }
        Response::NoMusic => {
            println!("No music found.");
            Ok(())
        }
        Response::NoPerms => anyhow::bail!("Music folders are not readable"),
        Response::Err(e) => anyhow::bail!("Indexing failed: {e}"),
    }
}

fn print_albums(library: &Library) {
    for album in library.albums() {
        let artists: Vec<&str> = album
            .artists
            .iter()
            .filter_map(|uid| library.artist(uid))
            .map(|artist| artist.name.as_deref().unwrap_or("Unknown Artist"))
            .collect();
        let year = album
            .dates
            .map(|d| format!(" ({d})"))
            .unwrap_or_default();
        println!(
            "  {} - {}{} [{}, {} songs]",
            artists.join(", "),
            album.name,
            year,
            album.release_type.name(),
            album.songs.len()
        );
    }
}
