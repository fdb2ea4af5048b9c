//! The extractor chain.
//!
//! Metadata is gathered in stages, each wrapping the one before it:
//!
//! ```text
//! TagExtractor  ->  MediaStoreExtractor  ->  CacheExtractor
//! (file tags)       (platform index)         (previous loads)
//! ```
//!
//! The media stage enumerates files and consults the cache first. Records
//! the cache could complete skip every later stage; the rest get the
//! platform index columns for their [`MediaTier`] and then a full tag read.
//! After the pass, [`Extractor::finalize`] hands every produced record back
//! down the chain so the cache can persist them.

pub mod cache;
pub mod media;
pub mod tags;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::path::PathBuf;

use crate::error::Result;
use crate::indexer::IndexContext;
use crate::model::Date;

pub use cache::{CacheExtractor, CacheRepository};
pub use media::{MediaIndex, MediaRow, MediaStoreExtractor, MediaTier, MusicDirs};
pub use tags::TagExtractor;

/// Multi-valued credit field. Most songs credit exactly one value.
pub type Credits = SmallVec<[String; 1]>;

/// Metadata accumulated for one file while it moves through the chain.
///
/// Fields start empty and are filled by whichever stage knows them; a later
/// stage may overwrite an earlier stage's guess with a more authoritative
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSong {
    /// Platform media index row id
    pub media_id: Option<i64>,
    pub path: Option<PathBuf>,
    pub mime_type: Option<String>,
    /// File size in bytes, part of the cache fingerprint
    pub size: Option<u64>,
    /// Seconds since the epoch
    pub date_added: Option<i64>,
    /// Seconds since the epoch, part of the cache fingerprint
    pub date_modified: Option<i64>,
    pub duration_ms: Option<u64>,

    pub name: Option<String>,
    pub sort_name: Option<String>,
    pub musicbrainz_id: Option<String>,
    pub track: Option<u32>,
    pub disc: Option<u32>,
    pub date: Option<Date>,
    pub replay_gain_track: Option<f32>,
    pub replay_gain_album: Option<f32>,

    pub album_name: Option<String>,
    pub album_sort_name: Option<String>,
    pub album_musicbrainz_id: Option<String>,
    pub release_types: Credits,

    pub artist_names: Credits,
    pub artist_sort_names: Credits,
    pub artist_musicbrainz_ids: Credits,

    pub album_artist_names: Credits,
    pub album_artist_sort_names: Credits,
    pub album_artist_musicbrainz_ids: Credits,

    pub genre_names: Credits,
}

impl RawSong {
    /// Whether the cached copy of this file is still valid for `other`.
    pub fn same_fingerprint(&self, other: &RawSong) -> bool {
        self.path == other.path
            && self.date_modified == other.date_modified
            && self.size == other.size
    }
}

/// Outcome of asking a stage to complete a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionResult {
    /// Fully populated from the cache; no further stage needs to run.
    Cached,
    /// Needs the remaining stages.
    NotCached,
}

/// Contract of the top of the extractor chain, as seen by the indexer.
#[async_trait]
pub trait Extractor: Send {
    /// Prepare the pass, returning the projected number of records.
    async fn init(&mut self) -> Result<usize>;

    /// Produce the next record, or `None` once the pass is exhausted.
    /// Single pass; not restartable.
    async fn next(&mut self) -> Result<Option<RawSong>>;

    /// Receive every record produced in this pass.
    async fn finalize(&mut self, raws: &[RawSong]) -> Result<()>;
}

/// Assemble the chain for one load pass.
///
/// `with_cache` selects a read-write cache; otherwise the cache is only
/// written, so stale entries can never leak into the pass.
pub fn build_chain(ctx: &IndexContext, with_cache: bool) -> Box<dyn Extractor> {
    let cache = if with_cache {
        CacheExtractor::read_write(ctx.cache.clone())
    } else {
        CacheExtractor::write_only(ctx.cache.clone())
    };
    let media = MediaStoreExtractor::new(
        ctx.media.clone(),
        ctx.settings.tier,
        ctx.dirs.clone(),
        ctx.settings.exclude_non_music,
        cache,
    );
    Box::new(TagExtractor::new(media, ctx.tags.clone()))
}
