//! Service boundary for the index synchronization engine.
//!
//! [`GalleryService`] is the request-scoped handler layer: each method
//! corresponds to one endpoint of the catalog API and runs independently,
//! with no lock serializing concurrent calls. Consistency against
//! racing writers comes from the index store's write-then-verify
//! protocol, which detects (not prevents) a lost race; the losing caller
//! gets a hard error and must not assume its mutation landed.
//!
//! HTTP routing is deliberately absent. An embedder maps transport
//! requests onto these handlers and the typed replies back onto its
//! transport; the wire DTOs live in `zukan-types`.

pub mod error;
pub mod service;

pub use error::ServiceError;
pub use service::{FetchReply, GalleryService};
