//! Filesystem-backed media index.
//!
//! Desktop hosts have no platform media database, so [`DirectoryIndex`]
//! walks the configured music folders and presents each audio file as a
//! media index row. It knows file attributes only; every tag column is left
//! empty for the tag stage to fill.

pub mod watcher;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::extractor::media::{GenreMembers, MediaIndex, MediaRow, MusicDirs};

/// Supported audio file extensions (lowercase).
pub const AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"];

/// Whether `path` has a supported audio extension (case-insensitive).
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    Some(match ext.as_str() {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" | "aac" => "audio/mp4",
        _ => return None,
    })
}

/// A [`MediaIndex`] over one or more music folders.
///
/// Each root is exposed as a volume named after its position, so rows carry
/// both an absolute path and a volume-relative one and work under every
/// [`MediaTier`](crate::extractor::MediaTier).
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    roots: Vec<PathBuf>,
}

impl DirectoryIndex {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn scan(roots: &[PathBuf], dirs: &MusicDirs) -> Vec<MediaRow> {
        let mut rows = Vec::new();
        for (volume, root) in roots.iter().enumerate() {
            let walker = WalkDir::new(root)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok());

            for entry in walker {
                let path = entry.path();
                if !entry.file_type().is_file() || !is_audio_file(path) || !dirs.contains(path) {
                    continue;
                }
                let Some(row) = row_for(rows.len() as i64 + 1, volume, root, path) else {
                    debug!(target: "scanner", path = %path.display(), "Skipping file without metadata");
                    continue;
                };
                rows.push(row);
            }
        }
        rows
    }
}

fn row_for(id: i64, volume: usize, root: &Path, path: &Path) -> Option<MediaRow> {
    let meta = std::fs::metadata(path).ok()?;
    let relative_dir = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| {
            let dir = p.to_string_lossy().to_string();
            if dir.is_empty() { dir } else { format!("{dir}/") }
        })
        .unwrap_or_default();

    let modified = meta.modified().ok().map(epoch_seconds);
    Some(MediaRow {
        id,
        display_name: path.file_name().map(|n| n.to_string_lossy().to_string()),
        data: Some(path.to_string_lossy().to_string()),
        volume_name: Some(volume.to_string()),
        relative_path: Some(relative_dir),
        mime_type: mime_type(path).map(str::to_string),
        size: Some(meta.len()),
        date_added: meta.created().ok().map(epoch_seconds).or(modified),
        date_modified: modified,
        is_music: Some(true),
        ..Default::default()
    })
}

fn epoch_seconds(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl MediaIndex for DirectoryIndex {
    async fn query(&self, dirs: &MusicDirs) -> Result<Vec<MediaRow>> {
        let roots = self.roots.clone();
        let dirs = dirs.clone();
        // Perform the synchronous file system traversal on the blocking pool
        let rows = tokio::task::spawn_blocking(move || Self::scan(&roots, &dirs)).await?;
        info!(target: "scanner", roots = self.roots.len(), files = rows.len(), "Scanned music folders");
        Ok(rows)
    }

    async fn genre_members(&self) -> Result<Vec<GenreMembers>> {
        Ok(Vec::new())
    }

    fn volume_root(&self, volume: &str) -> Option<PathBuf> {
        let index: usize = volume.parse().ok()?;
        self.roots.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_scan_audio_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();

        File::create(root.join("song.mp3")).unwrap();
        File::create(root.join("music.flac")).unwrap();
        File::create(root.join("notes.txt")).unwrap(); // Should be ignored
        File::create(root.join("image.png")).unwrap(); // Should be ignored
        File::create(root.join("UPPERCASE.OGG")).unwrap(); // Case-insensitive

        let subdir = root.join("subdir");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("track.wav")).unwrap();
        File::create(subdir.join("ignore.doc")).unwrap();

        let index = DirectoryIndex::new(vec![root.to_path_buf()]);
        let rows = index.query(&MusicDirs::default()).await.unwrap();
        assert_eq!(rows.len(), 4);

        let names: Vec<String> = rows.iter().filter_map(|r| r.display_name.clone()).collect();
        assert!(names.contains(&"song.mp3".to_string()));
        assert!(names.contains(&"UPPERCASE.OGG".to_string()));
        assert!(!names.contains(&"notes.txt".to_string()));

        let track = rows.iter().find(|r| r.display_name.as_deref() == Some("track.wav")).unwrap();
        assert_eq!(track.relative_path.as_deref(), Some("subdir/"));
        assert_eq!(track.mime_type.as_deref(), Some("audio/wav"));
        assert!(track.title.is_none());
    }

    #[tokio::test]
    async fn test_rows_resolve_under_every_tier() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("Album");
        std::fs::create_dir(&subdir).unwrap();
        File::create(subdir.join("01.flac")).unwrap();

        let index = DirectoryIndex::new(vec![dir.path().to_path_buf()]);
        let rows = index.query(&MusicDirs::default()).await.unwrap();
        let row = &rows[0];

        let root = index.volume_root(row.volume_name.as_deref().unwrap()).unwrap();
        let relative = root
            .join(row.relative_path.as_deref().unwrap())
            .join(row.display_name.as_deref().unwrap());
        assert_eq!(relative, subdir.join("01.flac"));
        assert_eq!(PathBuf::from(row.data.as_deref().unwrap()), subdir.join("01.flac"));
    }

    #[tokio::test]
    async fn test_excluded_folders_are_skipped() {
        let dir = tempdir().unwrap();
        let podcasts = dir.path().join("podcasts");
        std::fs::create_dir(&podcasts).unwrap();
        File::create(dir.path().join("keep.mp3")).unwrap();
        File::create(podcasts.join("skip.mp3")).unwrap();

        let index = DirectoryIndex::new(vec![dir.path().to_path_buf()]);
        let dirs = MusicDirs {
            include: Vec::new(),
            exclude: vec![podcasts],
        };
        let rows = index.query(&dirs).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("song.mp3")));
        assert!(is_audio_file(Path::new("song.FLAC")));
        assert!(!is_audio_file(Path::new("image.png")));
        assert!(!is_audio_file(Path::new("noextension")));
        assert_eq!(DirectoryIndex::new(vec![]).volume_root("7"), None);
    }
}
