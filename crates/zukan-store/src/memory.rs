//! In-memory object store backend.
//!
//! Dev/test backend with one extra trick: injectable read staleness. The
//! real backing store is only eventually consistent, so a get right after
//! a put may return the previous version of the object. Tests drive the
//! index store's verification loop by asking this backend to serve the
//! superseded version for the next N reads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::ObjectStoreError;
use crate::object_store::{ObjectMeta, ObjectStore, ObjectSummary};

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
    last_modified: DateTime<Utc>,
    /// Body this put replaced, kept for staleness simulation.
    previous: Option<Vec<u8>>,
}

/// Concurrent in-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, StoredObject>,
    /// Remaining reads to serve from an object's superseded version.
    stale_reads: AtomicU32,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve the *previous* version of overwritten objects for the next
    /// `reads` gets, simulating an eventually-consistent replica that has
    /// not converged yet. Gets of never-overwritten objects are unaffected.
    pub fn set_stale_reads(&self, reads: u32) {
        self.stale_reads.store(reads, Ordering::SeqCst);
    }

    /// Seed an object together with user metadata, the way an uploader
    /// outside this engine would have written it.
    pub fn insert_with_metadata(
        &self,
        key: impl Into<String>,
        body: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
        last_modified: DateTime<Utc>,
    ) {
        self.objects.insert(
            key.into(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                metadata,
                last_modified,
                previous: None,
            },
        );
    }

    fn take_stale_read(&self) -> bool {
        self.stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError> {
        let Some(entry) = self.objects.get(key) else {
            return Ok(None);
        };
        if let Some(previous) = &entry.previous {
            if self.take_stale_read() {
                return Ok(Some(previous.clone()));
            }
        }
        Ok(Some(entry.body.clone()))
    }

    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let previous = self.objects.get(key).map(|e| e.body.clone());
        self.objects.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
                metadata: HashMap::new(),
                last_modified: Utc::now(),
                previous,
            },
        );
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.remove(key);
        Ok(())
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, ObjectStoreError> {
        Ok(self.objects.get(key).map(|entry| ObjectMeta {
            size: entry.body.len() as u64,
            last_modified: entry.last_modified,
            content_type: Some(entry.content_type.clone()),
            metadata: entry.metadata.clone(),
        }))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, ObjectStoreError> {
        let mut listing: Vec<ObjectSummary> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| ObjectSummary {
                key: entry.key().clone(),
                size: entry.body.len() as u64,
                last_modified: entry.last_modified,
            })
            .collect();
        listing.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listing)
    }
}
