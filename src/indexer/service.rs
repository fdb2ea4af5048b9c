//! The standard controller: owns the loading task.
//!
//! [`IndexerService`] registers itself as the indexer's controller. Every
//! start command cancels the load in flight and starts a new one once the old
//! task has wound down, so at most one load runs at a time. A cancelled load
//! resets the indexer before its task exits. Optionally a file watcher
//! requests a cached reload whenever the music folders change.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Controller, IndexContext, Indexer, State};
use crate::config::LibraryConfig;
use crate::error::{Error, Result};
use crate::scanner::watcher::{FileWatcher, WatchError};

struct LoadTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Controller that runs loads on a tokio runtime.
pub struct IndexerService {
    indexer: Arc<Indexer>,
    ctx: IndexContext,
    runtime: Handle,
    task: Mutex<Option<LoadTask>>,
    state: watch::Sender<Option<State>>,
}

impl IndexerService {
    /// Create the service and register it with `indexer`.
    ///
    /// Must be called from within a tokio runtime; loads run on that runtime.
    pub fn start(indexer: Arc<Indexer>, ctx: IndexContext) -> Result<Arc<Self>> {
        let runtime = Handle::try_current().map_err(|e| Error::Task(e.to_string()))?;
        let (state, _) = watch::channel(None);
        let service = Arc::new(Self {
            indexer,
            ctx,
            runtime,
            task: Mutex::new(None),
            state,
        });

        if !service.indexer.register_controller(service.clone()) {
            return Err(Error::ControllerRegistered);
        }
        Ok(service)
    }

    /// Follow the indexer state.
    pub fn subscribe(&self) -> watch::Receiver<Option<State>> {
        self.state.subscribe()
    }

    /// Start a load, superseding any load in flight.
    pub fn load(&self, with_cache: bool) {
        let mut task = self.task.lock();
        let previous = task.take();
        if let Some(previous) = &previous {
            debug!(target: "indexer::service", "Cancelling load in flight");
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let indexer = Arc::clone(&self.indexer);
        let ctx = self.ctx.clone();
        let handle = self.runtime.spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.handle.await {
                    warn!(target: "indexer::service", error = %e, "Previous load task failed");
                }
            }
            if token.is_cancelled() {
                return;
            }
            if indexer.index(&ctx, with_cache, &token).await.is_err() {
                indexer.reset();
            }
        });

        *task = Some(LoadTask { cancel, handle });
    }

    /// Cancel the load in flight, if any.
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().as_ref() {
            task.cancel.cancel();
        }
    }

    /// Request a cached reload whenever audio files under `paths` change.
    ///
    /// The watcher lives as long as the returned task.
    pub fn watch_for_changes(
        &self,
        paths: Vec<PathBuf>,
    ) -> std::result::Result<JoinHandle<()>, WatchError> {
        let (watcher, mut events) = FileWatcher::new(paths)?;
        let indexer = Arc::clone(&self.indexer);

        Ok(self.runtime.spawn(async move {
            let _watcher = watcher;
            while let Some(event) = events.recv().await {
                if !event.affects_library() {
                    continue;
                }
                // One reload covers the whole burst
                while events.try_recv().is_ok() {}
                info!(target: "indexer::service", ?event, "Music folders changed, reloading");
                indexer.request_reindex(true);
            }
        }))
    }

    /// Start [`Self::watch_for_changes`] over the library folders if the
    /// library is configured to reload on change.
    pub fn watch_if_enabled(
        &self,
        library: &LibraryConfig,
    ) -> std::result::Result<Option<JoinHandle<()>>, WatchError> {
        if !library.watch_for_changes {
            debug!(target: "indexer::service", "Automatic reloads disabled");
            return Ok(None);
        }
        self.watch_for_changes(library.paths.clone()).map(Some)
    }

    /// Cancel any load and unregister from the indexer.
    pub fn shutdown(self: &Arc<Self>) {
        self.cancel();
        let controller: Arc<dyn Controller> = self.clone();
        self.indexer.unregister_controller(&controller);
    }
}

impl Controller for IndexerService {
    fn on_start_indexing(&self, with_cache: bool) {
        self.load(with_cache);
    }

    fn on_indexer_state_changed(&self, state: Option<&State>) {
        self.state.send_replace(state.cloned());
    }
}
