//! Everything one load needs from the host.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, MusicSettings};
use crate::extractor::{CacheRepository, MediaIndex, MusicDirs};
use crate::metadata::{LoftyReader, TagReader};
use crate::scanner::DirectoryIndex;

/// Answers whether the music can be read at all. Queried once per load.
pub trait PermissionSource: Send + Sync {
    fn has_permission(&self) -> bool;
}

/// Grants permission when every music folder can be listed.
#[derive(Debug, Clone)]
pub struct FolderPermission {
    roots: Vec<PathBuf>,
}

impl FolderPermission {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl PermissionSource for FolderPermission {
    fn has_permission(&self) -> bool {
        self.roots.iter().all(|root| match std::fs::read_dir(root) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(target: "indexer", path = %root.display(), error = %e, "Music folder is not readable");
                false
            }
        })
    }
}

/// The collaborators and settings of one load pass.
#[derive(Clone)]
pub struct IndexContext {
    pub permission: Arc<dyn PermissionSource>,
    pub media: Arc<dyn MediaIndex>,
    pub cache: Arc<dyn CacheRepository>,
    pub tags: Arc<dyn TagReader>,
    pub settings: MusicSettings,
    pub dirs: MusicDirs,
}

impl IndexContext {
    /// Desktop context: the configured folders are walked directly and read
    /// with lofty.
    pub fn from_config(config: &Config, cache: Arc<dyn CacheRepository>) -> Self {
        let roots = config.library.paths.clone();
        Self {
            permission: Arc::new(FolderPermission::new(roots.clone())),
            media: Arc::new(DirectoryIndex::new(roots.clone())),
            cache,
            tags: Arc::new(LoftyReader),
            settings: config.music.clone(),
            dirs: MusicDirs {
                include: roots,
                exclude: config.library.exclude_paths.clone(),
            },
        }
    }
}
