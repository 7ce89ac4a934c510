//! Client-side index cache and mutation coalescer.
//!
//! Everything here exists for perceived latency: the UI reads the last
//! known index immediately, edits it locally before the server confirms,
//! and batches rapid actions into minimal round-trips. The server copy
//! is always authoritative; on any conflict or failure the client view
//! reconciles toward it, never the other way around.
//!
//! # Pieces
//!
//! |---------------------|---------------------------------------------|
//! | Type                | Purpose                                     |
//! |---------------------|---------------------------------------------|
//! | [`GalleryApi`]      | The network seam the cache+coalescer call   |
//! | [`IndexCache`]      | Last known index, conditional refresh,      |
//! |                     | optimistic edits with automatic inverses    |
//! | [`CachePersistence`]| Durable storage for the cached entry        |
//! | [`MutationCoalescer`]| Delete-wins intent queue, debounced flush  |
//! | calc functions      | Pure candidate builders for full replaces   |
//! |---------------------|---------------------------------------------|
//!
//! # Threading model
//!
//! [`IndexCache`] mirrors the original environment (one UI event loop
//! per tab), so its methods take `&mut self` and nothing inside locks.
//! An in-flight `fetch` is cancelled by dropping its future; exclusive
//! borrows make issuing a newer fetch while an older one is live
//! impossible, which is the whole of the last-request-wins rule. The
//! [`MutationCoalescer`] does need timers, so it is `Clone + Send` and
//! schedules its debounce/flush work on tokio tasks.

pub mod api;
pub mod cache;
pub mod calc;
pub mod coalescer;
pub mod constants;
pub mod storage;

pub use api::{ApiError, FetchOutcome, GalleryApi};
pub use cache::{CacheState, IndexCache, Rollback};
pub use calc::{
    calculate_batch_like_toggle, calculate_delete_decrement, calculate_upload_increment,
};
pub use coalescer::{CoalescerConfig, FlushOutcome, MutationCoalescer};
pub use storage::{CacheError, CachePersistence, CachedIndexEntry, JsonFileCacheStorage, MemoryCacheStorage};
