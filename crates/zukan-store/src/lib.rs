//! Object-store backends and the authoritative index store.
//!
//! The backing store is an eventually-consistent blob store with no
//! listing-consistency or transactional guarantee; everything here is
//! built around that. The server talks to storage only through the
//! [`ObjectStore`] trait (get/put/delete/head/list), and the
//! [`IndexStore`] layers the catalog semantics on top:
//!
//! ```text
//! IndexStore (owns the canonical index document)
//! ├── get      → TTL memo, else read index key, else bootstrap empty
//! ├── rebuild  → list raw objects, head each, preserve liked flags
//! ├── add / remove / toggle_likes → shared IndexEdit logic + persist
//! ├── replace  → full-document overwrite path (validated)
//! └── persist  → write-then-verify: put, bounded read-backs, memo refresh
//! ```
//!
//! Writes are optimistic: nothing serializes concurrent mutators, and the
//! read-back verification *detects* a lost race rather than preventing it.
//! A caller whose verification fails must surface the error; the store
//! never pretends such a write landed.

pub mod config;
pub mod error;
pub mod index_store;
pub mod memory;
pub mod object_store;

pub use config::StoreConfig;
pub use error::{IndexStoreError, ObjectStoreError};
pub use index_store::IndexStore;
pub use memory::MemoryObjectStore;
pub use object_store::{ObjectMeta, ObjectStore, ObjectSummary, CONTENT_TYPE_JSON, META_HEIGHT, META_WIDTH};
