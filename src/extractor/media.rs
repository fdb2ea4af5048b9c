//! Platform media index stage.
//!
//! The host platform keeps its own index of audio files with a handful of
//! pre-parsed columns. Querying it is much cheaper than opening every file,
//! so it enumerates the library and supplies a first guess at each song's
//! metadata. What it exposes depends on the platform's capability tier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::smallvec;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::{CacheExtractor, Credits, ExtractionResult, RawSong};
use crate::error::Result;
use crate::library::parse::{parse_position, unpack_track_disc};
use crate::model::Date;

/// Placeholder some media indexes store for missing text columns.
const UNKNOWN_COLUMN: &str = "<unknown>";

/// One row of the platform media index. Every column is optional; which ones
/// are meaningful depends on the [`MediaTier`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaRow {
    pub id: i64,
    pub display_name: Option<String>,
    /// Absolute path, legacy tier only
    pub data: Option<String>,
    pub volume_name: Option<String>,
    /// Directory relative to the volume root, with trailing separator
    pub relative_path: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub date_added: Option<i64>,
    pub date_modified: Option<i64>,
    pub duration_ms: Option<u64>,
    pub is_music: Option<bool>,

    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub year: Option<i32>,
    /// `disc * 1000 + track`
    pub track: Option<i64>,
    pub cd_track_number: Option<String>,
    pub disc_number: Option<String>,
    pub genre: Option<String>,
}

/// Songs belonging to one entry of the legacy genre table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreMembers {
    pub name: String,
    pub song_ids: Vec<i64>,
}

/// Which folders a query should cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MusicDirs {
    pub include: Vec<PathBuf>,
    pub exclude: Vec<PathBuf>,
}

impl MusicDirs {
    /// Whether `path` falls under an included folder and no excluded one.
    /// With no included folders, everything not excluded counts.
    pub fn contains(&self, path: &std::path::Path) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|d| path.starts_with(d));
        included && !self.exclude.iter().any(|d| path.starts_with(d))
    }
}

/// The platform media index, supplied by the host.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    /// Query every audio row inside `dirs`.
    async fn query(&self, dirs: &MusicDirs) -> Result<Vec<MediaRow>>;

    /// Query the legacy genre membership table.
    async fn genre_members(&self) -> Result<Vec<GenreMembers>>;

    /// Root directory of a storage volume.
    fn volume_root(&self, volume: &str) -> Option<PathBuf>;
}

/// Capability tier of the platform media index. Each tier exposes strictly
/// more columns than the one before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaTier {
    /// Absolute paths, packed track numbers, separate genre table.
    Legacy,
    /// Adds volume-relative paths and an album artist column.
    Q,
    /// Adds separate track/disc columns and an inline genre column.
    #[default]
    R,
}

impl MediaTier {
    fn uses_genre_table(self) -> bool {
        matches!(self, MediaTier::Legacy | MediaTier::Q)
    }

    fn path(self, row: &MediaRow, index: &dyn MediaIndex) -> Option<PathBuf> {
        match self {
            MediaTier::Legacy => row.data.as_deref().filter(|d| !d.is_empty()).map(PathBuf::from),
            MediaTier::Q | MediaTier::R => {
                let root = index.volume_root(row.volume_name.as_deref()?)?;
                let name = row.display_name.as_deref().filter(|n| !n.is_empty())?;
                let relative = row.relative_path.as_deref().unwrap_or("");
                Some(root.join(relative).join(name))
            }
        }
    }

    fn track_disc(self, row: &MediaRow) -> (Option<u32>, Option<u32>) {
        let packed = row.track.map(unpack_track_disc).unwrap_or((None, None));
        match self {
            MediaTier::Legacy | MediaTier::Q => packed,
            MediaTier::R => (
                row.cd_track_number.as_deref().and_then(parse_position).or(packed.0),
                row.disc_number.as_deref().and_then(parse_position).or(packed.1),
            ),
        }
    }

    /// Fill `raw` with the tag columns this tier exposes.
    fn populate(self, row: &MediaRow, raw: &mut RawSong, genres: &HashMap<i64, Credits>) {
        raw.name = column(&row.title);
        raw.album_name = column(&row.album);
        raw.artist_names = column(&row.artist).into_iter().collect();
        raw.date = row.year.filter(|y| *y > 0).map(Date::from_year);
        (raw.track, raw.disc) = self.track_disc(row);

        if matches!(self, MediaTier::Q | MediaTier::R) {
            raw.album_artist_names = column(&row.album_artist).into_iter().collect();
        }

        raw.genre_names = match self {
            MediaTier::R => column(&row.genre).into_iter().collect(),
            MediaTier::Legacy | MediaTier::Q => genres.get(&row.id).cloned().unwrap_or_default(),
        };
    }
}

fn column(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != UNKNOWN_COLUMN)
        .map(str::to_string)
}

/// The media index stage, wrapping the cache stage.
pub struct MediaStoreExtractor {
    index: Arc<dyn MediaIndex>,
    tier: MediaTier,
    dirs: MusicDirs,
    exclude_non_music: bool,
    cache: CacheExtractor,
    rows: std::vec::IntoIter<MediaRow>,
    genres: HashMap<i64, Credits>,
}

impl MediaStoreExtractor {
    pub fn new(
        index: Arc<dyn MediaIndex>,
        tier: MediaTier,
        dirs: MusicDirs,
        exclude_non_music: bool,
        cache: CacheExtractor,
    ) -> Self {
        Self {
            index,
            tier,
            dirs,
            exclude_non_music,
            cache,
            rows: Vec::new().into_iter(),
            genres: HashMap::new(),
        }
    }

    /// Load the cache and query the index. Returns the number of rows, which
    /// is an upper bound on the records this stage will produce.
    pub async fn init(&mut self) -> Result<usize> {
        self.cache.init().await;

        let mut rows = self.index.query(&self.dirs).await?;
        if self.exclude_non_music {
            rows.retain(|row| row.is_music != Some(false));
        }

        if self.tier.uses_genre_table() {
            self.genres.clear();
            for members in self.index.genre_members().await? {
                let name = members.name.trim();
                if name.is_empty() || name == UNKNOWN_COLUMN {
                    continue;
                }
                for id in members.song_ids {
                    self.genres
                        .entry(id)
                        .or_insert_with(|| smallvec![])
                        .push(name.to_string());
                }
            }
        }

        info!(target: "extractor::media", tier = ?self.tier, rows = rows.len(), "Queried media index");
        let total = rows.len();
        self.rows = rows.into_iter();
        Ok(total)
    }

    /// Produce the next record. Rows without a resolvable path are dropped.
    pub async fn next(&mut self) -> Result<Option<(RawSong, ExtractionResult)>> {
        for row in self.rows.by_ref() {
            let Some(path) = self.tier.path(&row, self.index.as_ref()) else {
                debug!(target: "extractor::media", id = row.id, "Dropping row without a usable path");
                continue;
            };

            let mut raw = RawSong {
                media_id: Some(row.id),
                path: Some(path),
                mime_type: column(&row.mime_type),
                size: row.size,
                date_added: row.date_added,
                date_modified: row.date_modified,
                duration_ms: row.duration_ms,
                ..Default::default()
            };

            if self.cache.populate(&mut raw) == ExtractionResult::Cached {
                return Ok(Some((raw, ExtractionResult::Cached)));
            }

            self.tier.populate(&row, &mut raw, &self.genres);
            return Ok(Some((raw, ExtractionResult::NotCached)));
        }
        Ok(None)
    }

    pub async fn finalize(&mut self, raws: &[RawSong]) -> Result<()> {
        self.cache.finalize(raws).await;
        Ok(())
    }
}
