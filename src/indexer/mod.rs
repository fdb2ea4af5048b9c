//! The indexer: load lifecycle, progress state and observer fan-out.
//!
//! One [`Indexer`] is shared by everything that wants to start or watch a
//! load. It keeps two pieces of state under a single lock:
//!
//! - the progress of the load in flight, if any ([`Indexing`])
//! - the outcome of the last finished load, if any ([`Response`])
//!
//! and derives the published [`State`] from them. At most one
//! [`Controller`] (which starts loads) and one [`Callback`] (which only
//! watches) are registered at a time; both hear about every state change.
//!
//! Running loads is the controller's job: it calls [`Indexer::index`] from a
//! task it owns, cancels that task when a new load is requested, and calls
//! [`Indexer::reset`] after a cancellation. [`service::IndexerService`] is
//! such a controller.

mod context;
pub mod service;

pub use context::{FolderPermission, IndexContext, PermissionSource};

use parking_lot::Mutex;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::extractor::build_chain;
use crate::library::Library;
use crate::model::Song;

/// Progress of the load in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    /// Working, but the remaining time cannot be estimated.
    Indeterminate,
    /// `current` songs accepted out of a projected `total`. The projection
    /// can be stale, so `current` may exceed it.
    Songs { current: usize, total: usize },
}

/// Outcome of one load.
#[derive(Debug, Clone)]
pub enum Response {
    Ok(Arc<Library>),
    /// The load worked but found nothing.
    NoMusic,
    /// The music could not be read.
    NoPerms,
    /// The load failed. Retrying is up to the host.
    Err(Arc<Error>),
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Response::Ok(a), Response::Ok(b)) => Arc::ptr_eq(a, b) || a == b,
            (Response::NoMusic, Response::NoMusic) | (Response::NoPerms, Response::NoPerms) => true,
            (Response::Err(a), Response::Err(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// State published to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Indexing(Indexing),
    Complete(Response),
}

/// The load was cancelled. Never stored as a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("indexing was cancelled")]
pub struct Cancelled;

/// Why a load pass stopped early.
#[derive(Debug, thiserror::Error)]
enum IndexError {
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
    #[error(transparent)]
    Failed(#[from] Error),
}

/// Starts loads and observes them.
///
/// Observer methods run while the indexer's lock is held: they must not
/// call back into the [`Indexer`] synchronously.
pub trait Controller: Send + Sync {
    /// Begin a load. Cancelling any load already running is the
    /// controller's responsibility.
    fn on_start_indexing(&self, with_cache: bool);

    /// `None` only before any load has ever run.
    fn on_indexer_state_changed(&self, state: Option<&State>);
}

/// Observes loads without controlling them. Same locking rules as
/// [`Controller::on_indexer_state_changed`].
pub trait Callback: Send + Sync {
    fn on_indexer_state_changed(&self, state: Option<&State>);
}

#[derive(Default)]
struct Inner {
    indexing_state: Option<Indexing>,
    last_response: Option<Response>,
    controller: Option<Arc<dyn Controller>>,
    callback: Option<Arc<dyn Callback>>,
}

impl Inner {
    fn state(&self) -> Option<State> {
        match (&self.indexing_state, &self.last_response) {
            (Some(indexing), _) => Some(State::Indexing(*indexing)),
            (None, Some(response)) => Some(State::Complete(response.clone())),
            (None, None) => None,
        }
    }

    /// Deliver the current state, controller first.
    fn publish(&self) {
        let state = self.state();
        if let Some(controller) = &self.controller {
            controller.on_indexer_state_changed(state.as_ref());
        }
        if let Some(callback) = &self.callback {
            callback.on_indexer_state_changed(state.as_ref());
        }
    }
}

/// Coordinates loads and publishes their progress.
pub struct Indexer {
    inner: Mutex<Inner>,
    /// Where completion is delivered, when observers are bound to one
    /// execution context.
    main: Option<Handle>,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer {
    /// An indexer that publishes everything from the loading task.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            main: None,
        }
    }

    /// An indexer that delivers each load's completion on `main`.
    ///
    /// Progress updates are still published from the loading task; only the
    /// final state is marshalled.
    pub fn with_main_context(main: Handle) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            main: Some(main),
        }
    }

    /// The state observers were last told about.
    pub fn state(&self) -> Option<State> {
        self.inner.lock().state()
    }

    pub fn last_response(&self) -> Option<Response> {
        self.inner.lock().last_response.clone()
    }

    /// Install `controller` and immediately deliver the current state to it.
    ///
    /// Returns `false`, without delivering anything, if a controller is
    /// already registered.
    pub fn register_controller(&self, controller: Arc<dyn Controller>) -> bool {
        let mut inner = self.inner.lock();
        if inner.controller.is_some() {
            warn!(target: "indexer", "Controller already registered, ignoring");
            return false;
        }
        controller.on_indexer_state_changed(inner.state().as_ref());
        inner.controller = Some(controller);
        true
    }

    /// Remove `controller` if it is the registered one.
    pub fn unregister_controller(&self, controller: &Arc<dyn Controller>) {
        let mut inner = self.inner.lock();
        if inner
            .controller
            .as_ref()
            .is_some_and(|current| same_instance(current, controller))
        {
            inner.controller = None;
        }
    }

    /// Install `callback` and immediately deliver the current state to it.
    ///
    /// Returns `false`, without delivering anything, if a callback is
    /// already registered.
    pub fn register_callback(&self, callback: Arc<dyn Callback>) -> bool {
        let mut inner = self.inner.lock();
        if inner.callback.is_some() {
            warn!(target: "indexer", "Callback already registered, ignoring");
            return false;
        }
        callback.on_indexer_state_changed(inner.state().as_ref());
        inner.callback = Some(callback);
        true
    }

    /// Remove `callback` if it is the registered one.
    pub fn unregister_callback(&self, callback: &Arc<dyn Callback>) {
        let mut inner = self.inner.lock();
        if inner
            .callback
            .as_ref()
            .is_some_and(|current| same_instance(current, callback))
        {
            inner.callback = None;
        }
    }

    /// Ask the controller to start a load. Does nothing without one.
    pub fn request_reindex(&self, with_cache: bool) {
        let controller = self.inner.lock().controller.clone();
        match controller {
            // Called unlocked: starting a load may cancel and reset the
            // previous one.
            Some(controller) => controller.on_start_indexing(with_cache),
            None => debug!(target: "indexer", "No controller registered, ignoring reindex request"),
        }
    }

    /// Drop any in-flight progress so observers fall back to the last
    /// response. Called after a load is cancelled.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.indexing_state = None;
        inner.publish();
    }

    /// Run one load and publish its outcome.
    ///
    /// Returns `Err(Cancelled)` without publishing anything if `cancel`
    /// fires; the caller should then [`reset`](Self::reset). Every other
    /// failure is published as [`Response::Err`].
    pub async fn index(
        self: &Arc<Self>,
        ctx: &IndexContext,
        with_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let start = Instant::now();
        info!(target: "indexer", with_cache, "Starting load");

        if !ctx.permission.has_permission() {
            warn!(target: "indexer", "Not permitted to read music");
            self.complete(Response::NoPerms).await;
            return Ok(());
        }

        let response = match self.load(ctx, with_cache, cancel).await {
            Ok(library) if library.is_empty() => {
                info!(target: "indexer", "No music found");
                Response::NoMusic
            }
            Ok(library) => {
                info!(
                    target: "indexer",
                    songs = library.songs().len(),
                    albums = library.albums().len(),
                    artists = library.artists().len(),
                    genres = library.genres().len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Load complete"
                );
                Response::Ok(Arc::new(library))
            }
            Err(IndexError::Cancelled(cancelled)) => {
                info!(target: "indexer", "Load cancelled");
                return Err(cancelled);
            }
            Err(IndexError::Failed(e)) => {
                error!(target: "indexer", error = %e, "Load failed");
                Response::Err(Arc::new(e))
            }
        };

        self.complete(response).await;
        Ok(())
    }

    async fn load(
        &self,
        ctx: &IndexContext,
        with_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Library, IndexError> {
        self.set_indexing(Indexing::Indeterminate);

        let mut chain = build_chain(ctx, with_cache);
        let total = cancellable(cancel, chain.init()).await??;
        debug!(target: "indexer", total, "Extractor chain ready");

        let mut raws = Vec::new();
        let mut songs = Vec::new();
        let mut seen = HashSet::new();
        while let Some(raw) = cancellable(cancel, chain.next()).await?? {
            // Duplicates are kept until the library sorts them, so the copy
            // that survives does not depend on arrival order.
            match Song::new(&raw, &ctx.settings) {
                Some(song) if seen.insert(song.uid.clone()) => {
                    songs.push(song);
                    self.set_indexing(Indexing::Songs {
                        current: seen.len(),
                        total,
                    });
                }
                Some(song) => {
                    debug!(target: "indexer", uid = %song.uid, path = %song.path.display(), "Duplicate song");
                    songs.push(song);
                }
                None => debug!(target: "indexer", "Skipping record without a path"),
            }
            raws.push(raw);

            tokio::task::yield_now().await;
            if cancel.is_cancelled() {
                return Err(Cancelled.into());
            }
        }

        self.set_indexing(Indexing::Indeterminate);
        cancellable(cancel, chain.finalize(&raws)).await??;

        let library = tokio::task::spawn_blocking(move || Library::build(songs))
            .await
            .map_err(Error::from)?;
        if cancel.is_cancelled() {
            return Err(Cancelled.into());
        }
        Ok(library)
    }

    fn set_indexing(&self, indexing: Indexing) {
        let mut inner = self.inner.lock();
        inner.indexing_state = Some(indexing);
        inner.publish();
    }

    /// Publish a finished load, on the main context when there is one.
    async fn complete(self: &Arc<Self>, response: Response) {
        let Some(main) = &self.main else {
            self.store_response(response);
            return;
        };

        let indexer = Arc::clone(self);
        let delivered = response.clone();
        if let Err(e) = main.spawn(async move { indexer.store_response(delivered) }).await {
            warn!(target: "indexer", error = %e, "Main context unavailable, publishing from the loading task");
            self.store_response(response);
        }
    }

    fn store_response(&self, response: Response) {
        let mut inner = self.inner.lock();
        inner.indexing_state = None;
        inner.last_response = Some(response);
        inner.publish();
    }
}

/// Run `fut` unless `cancel` fires first.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        out = fut => Ok(out),
    }
}

fn same_instance<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
