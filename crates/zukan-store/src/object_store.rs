//! The blob-store seam: five primitives, nothing more.
//!
//! The engine consumes the backing store exclusively through this trait
//! so the catalog logic stays independent of any vendor SDK. The
//! contract is deliberately weak: reads after writes may observe stale
//! data for a while, and listings carry no consistency guarantee. The
//! index store's write-then-verify protocol exists because of exactly
//! that weakness.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ObjectStoreError;

/// Content type used for the serialized index document.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// User-metadata key carrying the pixel width, when the uploader recorded it.
pub const META_WIDTH: &str = "width";

/// User-metadata key carrying the pixel height.
pub const META_HEIGHT: &str = "height";

/// One entry of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Per-object metadata returned by a head request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    /// Free-form user metadata (e.g. [`META_WIDTH`]/[`META_HEIGHT`]).
    pub metadata: HashMap<String, String>,
}

/// Abstract eventually-consistent blob store.
///
/// Absent keys are `None`, not errors; the bootstrap path depends on
/// that. Errors mean the backend itself failed.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch an object's bytes. `None` when the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>, ObjectStoreError>;

    /// Write an object, replacing any previous version wholesale.
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    /// Delete an object. Deleting an absent key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Fetch an object's metadata without its body. `None` when absent.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, ObjectStoreError>;

    /// List objects whose keys start with `prefix` (empty = everything).
    /// The listing reflects no particular point in time.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectSummary>, ObjectStoreError>;
}
