//! The network seam.
//!
//! The cache and coalescer speak to the server only through this trait.
//! Production embedders implement it over their transport; tests
//! implement it over a recorded script or wire it straight to the
//! server crate's handlers.

use async_trait::async_trait;
use thiserror::Error;

use zukan_types::wire::{BatchDeleteResponse, BatchLikeResponse, OverwriteRequest, OverwriteResponse};
use zukan_types::Index;

/// Failure of a network call.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// Transport-level failure: the request may or may not have reached
    /// the server.
    #[error("network: {0}")]
    Network(String),
    /// The server answered with a failure body.
    #[error("server: {0}")]
    Server(String),
}

/// Result of a conditional index fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The presented freshness token still matches; no payload.
    NotModified,
    /// A fresh payload and its freshness token.
    Fresh {
        index: Index,
        freshness_token: String,
    },
}

/// Typed client view of the catalog endpoints.
#[async_trait]
pub trait GalleryApi: Send + Sync + 'static {
    /// Conditional fetch: `if_none_match` carries the client's last
    /// freshness token, `rebuild` forces server-side re-derivation.
    async fn fetch_index(
        &self,
        if_none_match: Option<String>,
        rebuild: bool,
    ) -> Result<FetchOutcome, ApiError>;

    /// Full-document replace (see the overwrite endpoint contract).
    async fn overwrite_index(&self, req: OverwriteRequest) -> Result<OverwriteResponse, ApiError>;

    /// Batched delete of objects + thumbnails + index entries.
    async fn batch_delete(&self, file_names: Vec<String>) -> Result<BatchDeleteResponse, ApiError>;

    /// Batched like/unlike toggle.
    async fn batch_toggle_likes(
        &self,
        file_names: Vec<String>,
        liked: bool,
    ) -> Result<BatchLikeResponse, ApiError>;
}
