//! Durable client-side cache storage.
//!
//! The cached entry survives process restarts so a cold start can paint
//! the catalog before any network round-trip. A corrupt or unreadable
//! entry is treated as absent; stale cache must never block startup.

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use zukan_types::Index;

/// What gets persisted: the last known index and the freshness token it
/// was fetched (or locally advanced) under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedIndexEntry {
    pub index: Index,
    pub freshness_token: String,
}

/// Failure of the durable cache backend.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    #[error("cache storage: {0}")]
    Storage(String),
}

/// Durable storage seam for the cached entry.
///
/// Synchronous on purpose: the original environment's durable store is a
/// synchronous key-value API, and entries are small.
pub trait CachePersistence: Send + 'static {
    /// Load the cached entry. Absent and unreadable both yield `None`.
    fn load(&self) -> Result<Option<CachedIndexEntry>, CacheError>;
    /// Persist the entry, replacing any previous one.
    fn save(&self, entry: &CachedIndexEntry) -> Result<(), CacheError>;
    /// Drop the entry.
    fn clear(&self) -> Result<(), CacheError>;
}

/// In-memory persistence for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    entry: Mutex<Option<CachedIndexEntry>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CachePersistence for MemoryCacheStorage {
    fn load(&self) -> Result<Option<CachedIndexEntry>, CacheError> {
        Ok(self.entry.lock().clone())
    }

    fn save(&self, entry: &CachedIndexEntry) -> Result<(), CacheError> {
        *self.entry.lock() = Some(entry.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        *self.entry.lock() = None;
        Ok(())
    }
}

/// JSON-file persistence for native embedders.
#[derive(Debug)]
pub struct JsonFileCacheStorage {
    path: PathBuf,
}

impl JsonFileCacheStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CachePersistence for JsonFileCacheStorage {
    fn load(&self) -> Result<Option<CachedIndexEntry>, CacheError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Storage(err.to_string())),
        };
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "cached index unreadable, treating as absent");
                Ok(None)
            }
        }
    }

    fn save(&self, entry: &CachedIndexEntry) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::Storage(e.to_string()))?;
        }
        let bytes =
            serde_json::to_vec_pretty(entry).map_err(|e| CacheError::Storage(e.to_string()))?;
        std::fs::write(&self.path, bytes).map_err(|e| CacheError::Storage(e.to_string()))
    }

    fn clear(&self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CacheError::Storage(err.to_string())),
        }
    }
}
