use std::sync::Arc;

use docrag_core::{Error, Result};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared between one [`crate::IndexBuilder`] and any number of
/// [`crate::QueryEngine`]s that address the same collection.
///
/// Only serializes work inside this process. A second process rebuilding the
/// same collection can still expose an empty collection to readers between
/// its recreate and upsert steps.
#[derive(Debug, Clone, Default)]
pub struct IndexGuard {
    collection: Arc<RwLock<()>>,
    build: Arc<Mutex<()>>,
}

impl IndexGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a build holds the build slot.
    pub fn is_building(&self) -> bool {
        self.build.try_lock().is_err()
    }

    pub(crate) fn try_begin_build(&self) -> Result<OwnedMutexGuard<()>> {
        Arc::clone(&self.build).try_lock_owned().map_err(|_| Error::BuildInProgress)
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.collection.write().await
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.collection.read().await
    }
}
