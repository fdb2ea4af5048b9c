//! File system watcher for detecting music library changes.
//!
//! Uses the `notify` crate to watch the music folders and emit events when
//! audio files are added, modified, or removed. The indexer service turns
//! these into cached reloads.
//!
//! # Design
//!
//! - **Debounced events**: Multiple rapid changes coalesce into single events
//! - **Audio files only**: Filters for supported extensions
//! - **Async delivery**: Events arrive on a tokio channel
//! - **Graceful shutdown**: Stop watching by dropping the handle
//!
//! # Usage
//!
//! ```rust,ignore
//! let (watcher, mut rx) = FileWatcher::new(vec!["/music".into()])?;
//!
//! while let Some(event) = rx.recv().await {
//!     if event.affects_library() {
//!         service.request_reload();
//!     }
//! }
//! ```

use notify::{
    RecommendedWatcher, RecursiveMode,
    event::{CreateKind, ModifyKind, RemoveKind},
};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};

use super::is_audio_file;

/// How long changes are coalesced before an event is emitted.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A new audio file was created
    Created(PathBuf),
    /// An existing audio file was modified
    Modified(PathBuf),
    /// An audio file was removed
    Removed(PathBuf),
    /// A directory was created (may contain audio files)
    DirCreated(PathBuf),
    /// An error occurred while watching
    Error(String),
}

impl WatchEvent {
    /// Whether the library may look different after this event.
    pub fn affects_library(&self) -> bool {
        !matches!(self, WatchEvent::Error(_))
    }
}

/// Handle to a running file watcher.
///
/// Dropping this handle will stop the watcher.
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    running: Arc<AtomicBool>,
}

impl FileWatcher {
    /// Create a new file watcher for the given directories.
    ///
    /// Returns the watcher handle and a receiver for watch events.
    pub fn new(watch_paths: Vec<PathBuf>) -> Result<(Self, Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = mpsc::channel(256);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            if !running_clone.load(Ordering::Relaxed) {
                return;
            }
            Self::handle_debounced_events(result, &tx);
        })
        .map_err(|e| WatchError::Init(e.to_string()))?;

        let mut watcher = Self { debouncer, running };
        for path in watch_paths {
            watcher.watch(&path)?;
        }

        Ok((watcher, rx))
    }

    /// Add a directory to watch.
    pub fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        tracing::info!(target: "scanner::watcher", path = %path.display(), "Watching directory");
        self.debouncer
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch(e.to_string()))
    }

    /// Handle debounced events from notify.
    fn handle_debounced_events(result: DebounceEventResult, tx: &Sender<WatchEvent>) {
        match result {
            Ok(events) => {
                for event in events {
                    for path in &event.paths {
                        if let Some(evt) = classify(&event.kind, path) {
                            tracing::debug!(target: "scanner::watcher", event = ?evt, "Library change");
                            // A full channel already guarantees a pending reload.
                            let _ = tx.try_send(evt);
                        }
                    }
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!(target: "scanner::watcher", error = %error, "Watch error");
                    let _ = tx.try_send(WatchEvent::Error(error.to_string()));
                }
            }
        }
    }
}

fn classify(kind: &notify::EventKind, path: &Path) -> Option<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(CreateKind::Folder) => Some(WatchEvent::DirCreated(path.to_path_buf())),
        EventKind::Create(_) if is_audio_file(path) => Some(WatchEvent::Created(path.to_path_buf())),
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Metadata(_) | ModifyKind::Name(_))
            if is_audio_file(path) =>
        {
            Some(WatchEvent::Modified(path.to_path_buf()))
        }
        // Removed files can only be judged by extension
        EventKind::Remove(RemoveKind::File | RemoveKind::Any) if is_audio_file(path) => {
            Some(WatchEvent::Removed(path.to_path_buf()))
        }
        EventKind::Remove(RemoveKind::Folder) => Some(WatchEvent::Removed(path.to_path_buf())),
        _ => None,
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!(target: "scanner::watcher", "File watcher stopped");
    }
}

/// Errors that can occur during file watching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {0}")]
    Init(String),
    #[error("Failed to watch path: {0}")]
    Watch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::{DataChange, RemoveKind};
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_classify_filters_non_audio() {
        let song = Path::new("/m/song.mp3");
        let text = Path::new("/m/notes.txt");

        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), song),
            Some(WatchEvent::Created(song.to_path_buf()))
        );
        assert_eq!(classify(&EventKind::Create(CreateKind::File), text), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content)), song),
            Some(WatchEvent::Modified(song.to_path_buf()))
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File), song),
            Some(WatchEvent::Removed(song.to_path_buf()))
        );
        assert!(classify(&EventKind::Create(CreateKind::Folder), Path::new("/m/new")).is_some());
    }

    #[test]
    fn test_errors_do_not_affect_library() {
        assert!(!WatchEvent::Error("x".into()).affects_library());
        assert!(WatchEvent::Created("/m/a.mp3".into()).affects_library());
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let (watcher, _rx) = FileWatcher::new(vec![dir.path().to_path_buf()]).unwrap();
        drop(watcher); // Should not panic
    }

    #[tokio::test]
    async fn test_watcher_detects_new_file() {
        let dir = tempdir().unwrap();
        let (watcher, mut rx) = FileWatcher::new(vec![dir.path().to_path_buf()]).unwrap();

        let file_path = dir.path().join("new_song.mp3");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"fake mp3 content").unwrap();
        file.sync_all().unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await;
        drop(watcher);

        // Some filesystems deliver late or coalesce differently, so only a
        // delivered event is checked.
        if let Ok(Some(WatchEvent::Created(path))) = event {
            assert_eq!(path.file_name().unwrap(), "new_song.mp3");
        }
    }
}
