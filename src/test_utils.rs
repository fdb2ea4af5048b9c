//! Test utilities and fixtures for music-indexer tests.
//!
//! In-memory stand-ins for every collaborator of a load (media index, cache,
//! tag reader, permission, observers) plus factories for rows and songs.
//!
//! # Example
//!
//! ```ignore
//! use music_indexer::test_utils::{mock_row, test_context};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = test_context(vec![mock_row(1, "One")]);
//!     // ... test logic
//! }
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::ThreadId;
use tokio_util::sync::CancellationToken;

use crate::config::MusicSettings;
use crate::error::{Error, Result};
use crate::extractor::media::GenreMembers;
use crate::extractor::{CacheRepository, Credits, MediaIndex, MediaRow, MusicDirs, RawSong};
use crate::indexer::{Callback, Controller, IndexContext, Indexing, PermissionSource, State};
use crate::metadata::{TagFields, TagReader};
use crate::model::Song;

/// Volume every [`mock_row`] lives on.
pub const MOCK_VOLUME: &str = "external_primary";

/// Media index serving a fixed set of rows.
#[derive(Debug, Default)]
pub struct FakeMediaIndex {
    rows: Vec<MediaRow>,
    genres: Vec<GenreMembers>,
    failing: bool,
}

impl FakeMediaIndex {
    pub fn new(rows: Vec<MediaRow>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// An index whose queries always fail.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Add a legacy genre table entry.
    pub fn with_genre(mut self, name: &str, song_ids: &[i64]) -> Self {
        self.genres.push(GenreMembers {
            name: name.to_string(),
            song_ids: song_ids.to_vec(),
        });
        self
    }
}

#[async_trait]
impl MediaIndex for FakeMediaIndex {
    async fn query(&self, dirs: &MusicDirs) -> Result<Vec<MediaRow>> {
        if self.failing {
            return Err(Error::media_index("media index unavailable"));
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| {
                row.data
                    .as_deref()
                    .is_none_or(|data| dirs.contains(Path::new(data)))
            })
            .cloned()
            .collect())
    }

    async fn genre_members(&self) -> Result<Vec<GenreMembers>> {
        Ok(self.genres.clone())
    }

    fn volume_root(&self, volume: &str) -> Option<PathBuf> {
        (volume == MOCK_VOLUME).then(|| PathBuf::from("/storage/music"))
    }
}

/// Cache repository held in memory, counting writes.
#[derive(Debug, Default)]
pub struct MemoryCache {
    songs: Mutex<Vec<RawSong>>,
    writes: Mutex<usize>,
    failing: bool,
}

impl MemoryCache {
    pub fn with(songs: Vec<RawSong>) -> Self {
        Self {
            songs: Mutex::new(songs),
            ..Default::default()
        }
    }

    /// A cache that can be neither read nor written.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> usize {
        *self.writes.lock()
    }

    pub fn snapshot(&self) -> Vec<RawSong> {
        self.songs.lock().clone()
    }
}

#[async_trait]
impl CacheRepository for MemoryCache {
    async fn read_all(&self) -> Result<Vec<RawSong>> {
        if self.failing {
            return Err(Error::Io(std::io::Error::other("cache unreadable")));
        }
        Ok(self.snapshot())
    }

    async fn write_all(&self, songs: &[RawSong]) -> Result<()> {
        if self.failing {
            return Err(Error::Io(std::io::Error::other("cache unwritable")));
        }
        *self.songs.lock() = songs.to_vec();
        *self.writes.lock() += 1;
        Ok(())
    }
}

/// Tag reader returning canned titles.
#[derive(Debug, Default)]
pub struct StubTagReader {
    titles: HashMap<PathBuf, String>,
    failing: bool,
}

impl StubTagReader {
    /// A reader that fails on every file.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, path: &str, title: &str) -> Self {
        self.titles.insert(PathBuf::from(path), title.to_string());
        self
    }
}

impl TagReader for StubTagReader {
    fn read(&self, path: &Path) -> Result<TagFields> {
        if self.failing {
            return Err(Error::metadata(path, "unreadable tags"));
        }
        Ok(TagFields {
            name: self.titles.get(path).cloned(),
            ..Default::default()
        })
    }
}

/// Tag reader that panics on the file with the given name.
#[derive(Debug, Clone, Copy)]
pub struct PanickingTagReader(pub &'static str);

impl TagReader for PanickingTagReader {
    fn read(&self, path: &Path) -> Result<TagFields> {
        if path.ends_with(self.0) {
            panic!("malformed frame in {}", path.display());
        }
        Ok(TagFields::default())
    }
}

/// Permission source with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub bool);

impl PermissionSource for StaticPermission {
    fn has_permission(&self) -> bool {
        self.0
    }
}

/// Controller and callback that records everything it hears.
#[derive(Default)]
pub struct RecordingObserver {
    states: Mutex<Vec<Option<State>>>,
    threads: Mutex<Vec<ThreadId>>,
    starts: Mutex<Vec<bool>>,
    cancel_on: Mutex<Option<(Indexing, CancellationToken)>>,
    log: Option<(&'static str, Arc<Mutex<Vec<&'static str>>>)>,
}

impl RecordingObserver {
    /// An observer that also appends `name` to `log` on every delivery.
    pub fn logging(name: &'static str, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            log: Some((name, log)),
            ..Default::default()
        }
    }

    /// Cancel `token` as soon as `indexing` is delivered.
    pub fn cancel_when(&self, indexing: Indexing, token: CancellationToken) {
        *self.cancel_on.lock() = Some((indexing, token));
    }

    pub fn states(&self) -> Vec<Option<State>> {
        self.states.lock().clone()
    }

    /// The thread each state was delivered on.
    pub fn threads(&self) -> Vec<ThreadId> {
        self.threads.lock().clone()
    }

    pub fn starts(&self) -> Vec<bool> {
        self.starts.lock().clone()
    }

    fn record(&self, state: Option<&State>) {
        self.states.lock().push(state.cloned());
        self.threads.lock().push(std::thread::current().id());
        if let Some((name, log)) = &self.log {
            log.lock().push(*name);
        }
        if let Some((at, token)) = &*self.cancel_on.lock() {
            if state == Some(&State::Indexing(*at)) {
                token.cancel();
            }
        }
    }
}

impl Controller for RecordingObserver {
    fn on_start_indexing(&self, with_cache: bool) {
        self.starts.lock().push(with_cache);
    }

    fn on_indexer_state_changed(&self, state: Option<&State>) {
        self.record(state);
    }
}

impl Callback for RecordingObserver {
    fn on_indexer_state_changed(&self, state: Option<&State>) {
        self.record(state);
    }
}

/// A media index row for `/storage/music/Music/{id}.mp3`, with artist and
/// album columns filled in.
pub fn mock_row(id: i64, title: &str) -> MediaRow {
    MediaRow {
        id,
        display_name: Some(format!("{id}.mp3")),
        data: Some(format!("/storage/music/Music/{id}.mp3")),
        volume_name: Some(MOCK_VOLUME.to_string()),
        relative_path: Some("Music/".to_string()),
        mime_type: Some("audio/mpeg".to_string()),
        size: Some(1024 * 1024),
        date_added: Some(1_600_000_000 + id),
        date_modified: Some(1_650_000_000),
        duration_ms: Some(180_000),
        is_music: Some(true),
        title: Some(title.to_string()),
        album: Some("Test Album".to_string()),
        artist: Some("Test Artist".to_string()),
        ..Default::default()
    }
}

/// A load context over `rows` with every other collaborator faked.
pub fn test_context(rows: Vec<MediaRow>) -> IndexContext {
    IndexContext {
        permission: Arc::new(StaticPermission(true)),
        media: Arc::new(FakeMediaIndex::new(rows)),
        cache: Arc::new(MemoryCache::default()),
        tags: Arc::new(StubTagReader::default()),
        settings: MusicSettings::default(),
        dirs: MusicDirs::default(),
    }
}

/// A song as built from tags, before grouping.
pub fn mock_song(
    title: &str,
    album: &str,
    artists: &[&str],
    album_artists: &[&str],
    genres: &[&str],
) -> Song {
    let owned = |values: &[&str]| -> Credits { values.iter().map(|v| v.to_string()).collect() };
    let raw = RawSong {
        path: Some(PathBuf::from(format!("/music/{album}/{title}.mp3"))),
        name: Some(title.to_string()),
        album_name: Some(album.to_string()),
        artist_names: owned(artists),
        album_artist_names: owned(album_artists),
        genre_names: owned(genres),
        duration_ms: Some(200_000),
        date_added: Some(1_700_000_000),
        ..Default::default()
    };
    Song::new(&raw, &MusicSettings::default()).expect("mock song has a path")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_row_resolves_under_mock_volume() {
        let row = mock_row(7, "Seven");
        let root = FakeMediaIndex::default()
            .volume_root(row.volume_name.as_deref().unwrap())
            .unwrap();
        let path = root
            .join(row.relative_path.as_deref().unwrap())
            .join(row.display_name.as_deref().unwrap());
        assert_eq!(path.to_string_lossy(), row.data.unwrap());
    }

    #[test]
    fn test_mock_song_defaults() {
        let song = mock_song("Title", "Album", &["Artist"], &[], &[]);
        assert_eq!(song.name, "Title");
        assert!(song.album().is_none());
        assert_eq!(song.raw_album.artists, song.raw_artists);
    }

    #[tokio::test]
    async fn test_memory_cache_counts_writes() {
        let cache = MemoryCache::default();
        cache.write_all(&[RawSong::default()]).await.unwrap();
        assert_eq!(cache.writes(), 1);
        assert_eq!(cache.read_all().await.unwrap().len(), 1);
        assert!(MemoryCache::failing().read_all().await.is_err());
    }
}
