//! Deep tag stage: the last and most expensive link in the chain.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{debug, warn};

use super::{ExtractionResult, Extractor, MediaStoreExtractor, RawSong};
use crate::error::Result;
use crate::metadata::TagReader;

/// How many files may be read concurrently.
const TASK_CAPACITY: usize = 8;

/// A tag read in flight, tagged with the file it reads.
type PendingRead = BoxFuture<'static, (Option<PathBuf>, std::result::Result<Option<RawSong>, JoinError>)>;

/// Reads file tags for every record the cache could not complete.
///
/// Tag reads block, so each runs on the blocking pool; up to
/// [`TASK_CAPACITY`] run at once and finished records are produced in
/// completion order.
pub struct TagExtractor {
    media: MediaStoreExtractor,
    reader: Arc<dyn TagReader>,
    pending: FuturesUnordered<PendingRead>,
    exhausted: bool,
}

impl TagExtractor {
    pub fn new(media: MediaStoreExtractor, reader: Arc<dyn TagReader>) -> Self {
        Self {
            media,
            reader,
            pending: FuturesUnordered::new(),
            exhausted: false,
        }
    }
}

#[async_trait]
impl Extractor for TagExtractor {
    async fn init(&mut self) -> Result<usize> {
        self.exhausted = false;
        self.media.init().await
    }

    async fn next(&mut self) -> Result<Option<RawSong>> {
        loop {
            while !self.exhausted && self.pending.len() < TASK_CAPACITY {
                match self.media.next().await? {
                    Some((raw, ExtractionResult::Cached)) => return Ok(Some(raw)),
                    Some((raw, ExtractionResult::NotCached)) => {
                        let reader = Arc::clone(&self.reader);
                        let path = raw.path.clone();
                        let read = tokio::task::spawn_blocking(move || read_tags(reader.as_ref(), raw));
                        self.pending.push(read.map(move |joined| (path, joined)).boxed());
                    }
                    None => self.exhausted = true,
                }
            }

            match self.pending.next().await {
                Some((_, Ok(Some(raw)))) => return Ok(Some(raw)),
                Some((_, Ok(None))) => {}
                Some((path, Err(e))) => {
                    // A reader that panics on one file only loses that file
                    warn!(
                        target: "extractor::tags",
                        path = ?path,
                        error = %e,
                        "Tag read aborted, dropping file"
                    );
                }
                None => return Ok(None),
            }
        }
    }

    async fn finalize(&mut self, raws: &[RawSong]) -> Result<()> {
        self.media.finalize(raws).await
    }
}

/// Overlay file tags onto `raw`.
///
/// A file whose tags cannot be read keeps what the media index knew, as long
/// as that includes a title. Otherwise the record is malformed and dropped.
fn read_tags(reader: &dyn TagReader, mut raw: RawSong) -> Option<RawSong> {
    let path = raw.path.clone()?;
    match reader.read(&path) {
        Ok(fields) => {
            fields.apply(&mut raw);
            Some(raw)
        }
        Err(e) if raw.name.is_some() => {
            warn!(target: "extractor::tags", path = %path.display(), error = %e, "Unable to read tags, using media index data");
            Some(raw)
        }
        Err(e) => {
            debug!(target: "extractor::tags", path = %path.display(), error = %e, "Dropping unreadable file");
            None
        }
    }
}
