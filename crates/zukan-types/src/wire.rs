//! Request/response DTOs for the service seam.
//!
//! These are the JSON shapes spoken between the client crate and the
//! server handlers. HTTP routing is out of scope (an embedder maps these
//! onto whatever transport it likes), but the field names are the wire
//! contract and stay camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::Index;

/// Parameters for a (possibly conditional) index fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchIndexRequest {
    /// Force full re-derivation from the object listing.
    #[serde(default)]
    pub rebuild: bool,
    /// Freshness token from the client's last known copy. When it still
    /// matches, the handler reports not-modified instead of a payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_none_match: Option<String>,
}

/// A successful index fetch payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchIndexResponse {
    pub success: bool,
    pub data: Index,
}

/// Full-document replace request for the overwrite endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverwriteRequest {
    /// The fully-computed replacement index.
    pub json: Index,
    /// Caller-supplied label for logging; does not affect behavior.
    pub operation: String,
    /// Optional optimistic-concurrency precondition: the `lastUpdated`
    /// of the index the caller computed from. When present and older
    /// than the server's current value, the replace is rejected instead
    /// of silently losing the intervening update. Absent preserves plain
    /// last-write-wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_last_updated: Option<DateTime<Utc>>,
}

/// Timing breakdown of a verified write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteStats {
    /// Milliseconds spent in the put itself.
    pub write_time_ms: u64,
    /// Milliseconds from put start through the matching read-back.
    pub total_time_ms: u64,
    /// Read-back attempts consumed (1 = matched immediately).
    pub verify_attempts: u32,
}

/// Successful overwrite reply: the canonical echoed copy is authoritative
/// and `clear_cache` tells clients to drop derived cache layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverwriteResponse {
    pub success: bool,
    pub new_json: Index,
    pub clear_cache: bool,
    pub stats: WriteStats,
}

/// The failure arm every handler shares: `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

/// Batch delete request: removes objects, their thumbnails, and their
/// index entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub file_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteResponse {
    pub success: bool,
    pub message: String,
}

/// Batch like/unlike request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLikeRequest {
    pub file_names: Vec<String>,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLikeResponse {
    pub success: bool,
    pub message: String,
    pub new_index: Index,
}
