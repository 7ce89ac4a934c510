//! The canonical index document and its invariant helpers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema version written into every index document.
pub const INDEX_SCHEMA_VERSION: &str = "1.0";

/// One cataloged object.
///
/// `file_name` is the object-store key and the item's identity; there is
/// no surrogate id. `upload_time` is set at creation and immutable
/// thereafter; `is_liked` is the only frequently mutated field besides
/// deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexItem {
    /// Unique key into the object store.
    pub file_name: String,
    /// Byte length (informational).
    pub size: u64,
    /// Creation timestamp, immutable after the item is first indexed.
    pub upload_time: DateTime<Utc>,
    /// Favorite flag.
    #[serde(default)]
    pub is_liked: bool,
    /// Pixel width, populated opportunistically from object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Pixel height, populated opportunistically from object metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl IndexItem {
    /// Create an item with the fields every object has; dimensions start
    /// unknown and are filled in when metadata is available.
    pub fn new(file_name: impl Into<String>, size: u64, upload_time: DateTime<Utc>) -> Self {
        Self {
            file_name: file_name.into(),
            size,
            upload_time,
            is_liked: false,
            width: None,
            height: None,
        }
    }
}

/// Structural invariant violations detected by [`Index::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Two items share a `file_name`.
    #[error("duplicate file name in index: {0}")]
    DuplicateFileName(String),
    /// `total_count` disagrees with `images.len()`.
    #[error("totalCount {total_count} does not match {actual} items")]
    TotalCountMismatch { total_count: usize, actual: usize },
    /// `liked_count` disagrees with the number of liked items.
    #[error("likedCount {liked_count} does not match {actual} liked items")]
    LikedCountMismatch { liked_count: usize, actual: usize },
}

/// The canonical catalog document.
///
/// Serialized as one JSON object at a well-known object-store key.
/// `last_updated` strictly increases on every successful mutation and is
/// the source of the freshness token used for conditional fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    /// Schema version string.
    pub version: String,
    /// Strictly increasing mutation timestamp; freshness/ETag source.
    pub last_updated: DateTime<Utc>,
    /// Must equal `images.len()`.
    pub total_count: usize,
    /// Must equal the number of items with `is_liked`.
    pub liked_count: usize,
    /// Cataloged items in display order. Order is presentation only;
    /// `file_name` is the identity.
    pub images: Vec<IndexItem>,
}

impl Index {
    /// The bootstrap document: what `get()` returns when the index key
    /// does not exist yet.
    pub fn empty() -> Self {
        Self {
            version: INDEX_SCHEMA_VERSION.to_string(),
            last_updated: Utc::now(),
            total_count: 0,
            liked_count: 0,
            images: Vec::new(),
        }
    }

    /// Look up an item by its identity.
    pub fn get(&self, file_name: &str) -> Option<&IndexItem> {
        self.images.iter().find(|i| i.file_name == file_name)
    }

    /// Whether an item with this identity exists.
    pub fn contains(&self, file_name: &str) -> bool {
        self.get(file_name).is_some()
    }

    /// Recompute `total_count` and `liked_count` from `images`.
    ///
    /// Every mutation path calls this; the counts are denormalized purely
    /// so readers of the serialized document don't have to scan.
    pub fn recompute_counts(&mut self) {
        self.total_count = self.images.len();
        self.liked_count = self.images.iter().filter(|i| i.is_liked).count();
    }

    /// Check the structural invariants: unique `file_name`s and counts
    /// that match the items.
    pub fn validate(&self) -> Result<(), IndexError> {
        let mut seen = std::collections::HashSet::with_capacity(self.images.len());
        for item in &self.images {
            if !seen.insert(item.file_name.as_str()) {
                return Err(IndexError::DuplicateFileName(item.file_name.clone()));
            }
        }
        if self.total_count != self.images.len() {
            return Err(IndexError::TotalCountMismatch {
                total_count: self.total_count,
                actual: self.images.len(),
            });
        }
        let liked = self.images.iter().filter(|i| i.is_liked).count();
        if self.liked_count != liked {
            return Err(IndexError::LikedCountMismatch {
                liked_count: self.liked_count,
                actual: liked,
            });
        }
        Ok(())
    }

    /// Advance `last_updated` to the current instant, never backwards.
    ///
    /// Ties (clock not past the previous write yet) land 1ms after the
    /// previous value so the freshness token always changes.
    pub fn touch(&mut self) {
        self.last_updated = advance_timestamp(self.last_updated, Utc::now());
    }

    /// Freshness token for conditional fetches: derived from
    /// `last_updated` so unmodified-since checks are exact. Shaped like a
    /// strong ETag so it can ride in validator headers unchanged.
    pub fn freshness_token(&self) -> String {
        format!("\"{}\"", self.last_updated.timestamp_millis())
    }

    /// Whether a client-presented token still matches this document.
    pub fn matches_token(&self, token: &str) -> bool {
        self.freshness_token() == token
    }
}

/// The strictly-increasing timestamp rule: wall clock when it has moved,
/// otherwise 1ms past the previous value.
pub fn advance_timestamp(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > prev {
        now
    } else {
        prev + Duration::milliseconds(1)
    }
}
