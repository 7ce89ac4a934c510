//! Shared index document and wire types for Zukan.
//!
//! This crate is the catalog foundation: the denormalized JSON index
//! document, the edit operations applied to it, and the request/response
//! types spoken between the client and server crates. It has **no internal
//! zukan dependencies**: a pure leaf crate that other crates build on.
//!
//! # Document Overview
//!
//! ```text
//! Index ← the canonical catalog, one JSON document
//!     └── version        schema version string
//!     └── lastUpdated    strictly increasing; doubles as freshness token
//!     └── totalCount     == images.len()
//!     └── likedCount     == |{ i : i.isLiked }|
//!     └── images[]       IndexItem, display order
//!
//! IndexItem ← one cataloged object
//!     └── fileName       object-store key, the item's identity
//!     └── size, uploadTime, isLiked, width?, height?
//! ```
//!
//! # Key Types
//!
//! |-------------------|-----------------------------------------------|
//! | Type              | Purpose                                       |
//! |-------------------|-----------------------------------------------|
//! | [`Index`]         | The catalog document (counts + items)         |
//! | [`IndexItem`]     | One cataloged image                           |
//! | [`IndexEdit`]     | Field-level mutation (add/remove/set-liked)   |
//! | [`Operation`]     | Queued client intent (delete/like/unlike)     |
//! | [`OperationKind`] | Intent discriminant with delete-wins rule     |
//! | wire module       | Request/response DTOs for the service seam    |
//! |-------------------|-----------------------------------------------|
//!
//! The same [`Index::apply`] edit logic runs on both sides of the wire:
//! the server's index store uses it before persisting, the client's cache
//! uses it for optimistic local edits. Every apply returns its
//! compensating inverse so a failed server call can be rolled back.

pub mod index;
pub mod op;
pub mod wire;

pub use index::{
    Index, IndexError, IndexItem, advance_timestamp, INDEX_SCHEMA_VERSION,
};
pub use op::{IndexEdit, Operation, OperationKind};
pub use wire::{
    BatchDeleteRequest, BatchDeleteResponse, BatchLikeRequest, BatchLikeResponse, ErrorResponse,
    FetchIndexRequest, FetchIndexResponse, OverwriteRequest, OverwriteResponse, WriteStats,
};
