//! Cache stage of the extractor chain.
//!
//! The cache maps a file fingerprint (path, modification time, size) to the
//! metadata extracted for it on a previous load. Reading tags is by far the
//! slowest part of a load, so a warm cache lets unchanged files skip it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{ExtractionResult, RawSong};
use crate::error::Result;

/// Persistent storage behind the cache stage.
///
/// The format and medium are the implementation's concern; the stage only
/// reads everything once at the start of a pass and replaces everything at
/// the end.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Read every cached record.
    async fn read_all(&self) -> Result<Vec<RawSong>>;

    /// Replace the cache contents with `songs`.
    async fn write_all(&self, songs: &[RawSong]) -> Result<()>;
}

/// The cache stage, in one of its two access modes.
pub enum CacheExtractor {
    /// Serves unchanged files from the cache, then rewrites it if anything
    /// changed.
    ReadWrite {
        repository: Arc<dyn CacheRepository>,
        entries: HashMap<PathBuf, RawSong>,
        invalidated: bool,
    },
    /// Never serves entries, but still persists this pass for the next one.
    WriteOnly {
        repository: Arc<dyn CacheRepository>,
    },
}

impl CacheExtractor {
    pub fn read_write(repository: Arc<dyn CacheRepository>) -> Self {
        Self::ReadWrite {
            repository,
            entries: HashMap::new(),
            invalidated: false,
        }
    }

    pub fn write_only(repository: Arc<dyn CacheRepository>) -> Self {
        Self::WriteOnly { repository }
    }

    /// Load the cache. A cache that cannot be read is treated as empty; it
    /// only ever speeds a load up.
    pub async fn init(&mut self) {
        let Self::ReadWrite {
            repository,
            entries,
            invalidated,
        } = self
        else {
            return;
        };

        match repository.read_all().await {
            Ok(songs) => {
                *entries = songs
                    .into_iter()
                    .filter_map(|song| song.path.clone().map(|path| (path, song)))
                    .collect();
                info!(target: "extractor::cache", entries = entries.len(), "Loaded tag cache");
            }
            Err(e) => {
                warn!(target: "extractor::cache", error = %e, "Unable to read tag cache, ignoring it");
                entries.clear();
                *invalidated = true;
            }
        }
    }

    /// Complete `raw` from the cache if its fingerprint still matches.
    ///
    /// Fields the media index supplies fresh on every pass (row id, date
    /// added) are kept from `raw`.
    pub fn populate(&mut self, raw: &mut RawSong) -> ExtractionResult {
        let Self::ReadWrite {
            entries,
            invalidated,
            ..
        } = self
        else {
            return ExtractionResult::NotCached;
        };

        let Some(path) = raw.path.clone() else {
            return ExtractionResult::NotCached;
        };

        match entries.remove(&path) {
            Some(cached) if cached.same_fingerprint(raw) => {
                let media_id = raw.media_id;
                let date_added = raw.date_added;
                *raw = cached;
                raw.media_id = media_id;
                raw.date_added = date_added;
                ExtractionResult::Cached
            }
            Some(_) => {
                debug!(target: "extractor::cache", path = %path.display(), "Stale cache entry");
                *invalidated = true;
                ExtractionResult::NotCached
            }
            None => {
                *invalidated = true;
                ExtractionResult::NotCached
            }
        }
    }

    /// Persist the pass. Failing to write only costs the next load time, so
    /// it is logged rather than propagated.
    pub async fn finalize(&mut self, raws: &[RawSong]) {
        let repository = match self {
            Self::ReadWrite {
                repository,
                entries,
                invalidated,
            } => {
                // Leftover entries belong to files that disappeared.
                if !*invalidated && entries.is_empty() {
                    debug!(target: "extractor::cache", "Tag cache unchanged, not rewriting");
                    return;
                }
                repository
            }
            Self::WriteOnly { repository } => repository,
        };

        match repository.write_all(raws).await {
            Ok(()) => info!(target: "extractor::cache", entries = raws.len(), "Wrote tag cache"),
            Err(e) => error!(target: "extractor::cache", error = %e, "Unable to write tag cache"),
        }
    }
}
