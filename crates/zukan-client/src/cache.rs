//! The client index cache.
//!
//! Gives the UI immediate access to the last known index while keeping
//! it reasonably fresh, and applies local edits instantly without
//! waiting for server confirmation.
//!
//! # State Machine
//!
//! ```text
//! +---------------+
//! | Uninitialized |
//! +-------+-------+
//!         | fetch(): durable hit, or network load
//!         v
//! +---------------+   fetch()              +------------+
//! |     Ready     | ---------------------> | Refreshing |
//! |               | <--------------------- | (Loading   |
//! +-------+-------+   fresh / not-modified |  if empty) |
//!         |                                +-----+------+
//!         | update_optimistically()              | failure, nothing to show
//!         v                                      v
//! +---------------+                        +------------+
//! |   Mutating    | commit() / rollback()  |   Error    |
//! |               | ---> Ready             +------------+
//! +---------------+
//! ```
//!
//! A failed refresh that still has something to display (in memory or a
//! durable snapshot) falls back to `Ready`; the UI is never blanked by
//! a transient network failure. `Error` is reserved for "nothing to
//! show at all".
//!
//! # Cancellation
//!
//! Methods take `&mut self`, mirroring the single-threaded event loop
//! the original runs in. Dropping an in-flight `fetch` future cancels
//! it; because a second fetch cannot even be constructed while an older
//! one is borrowed, an out-of-order application of a stale response is
//! unrepresentable. Last request wins by construction.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use zukan_types::{Index, IndexEdit};

use crate::api::{ApiError, FetchOutcome, GalleryApi};
use crate::storage::{CacheError, CachePersistence, CachedIndexEntry};

/// Where the cache is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Nothing loaded yet.
    Uninitialized,
    /// First load in flight, nothing to display meanwhile.
    Loading,
    /// A usable index is held.
    Ready,
    /// A usable index is held; a newer copy is being fetched.
    Refreshing,
    /// Optimistic edits applied locally, server confirmation pending.
    Mutating,
    /// Load failed and there is nothing to fall back to.
    Error,
}

/// Compensating edits captured by an optimistic update.
///
/// Apply via [`IndexCache::rollback`] when the real server call fails.
/// Marked `must_use`: dropping it silently means a failed server call
/// has no way back to the pre-edit view.
#[must_use = "hold the rollback and apply it if the server call fails"]
#[derive(Debug)]
pub struct Rollback {
    inverses: Vec<IndexEdit>,
}

/// Client-side cache of the catalog index.
pub struct IndexCache<A, P> {
    api: Arc<A>,
    persistence: P,
    state: CacheState,
    index: Option<Index>,
    freshness_token: Option<String>,
}

impl<A: GalleryApi, P: CachePersistence> IndexCache<A, P> {
    pub fn new(api: Arc<A>, persistence: P) -> Self {
        Self {
            api,
            persistence,
            state: CacheState::Uninitialized,
            index: None,
            freshness_token: None,
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    /// The currently displayed index, if any.
    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    pub fn freshness_token(&self) -> Option<&str> {
        self.freshness_token.as_deref()
    }

    /// Load or refresh the index.
    ///
    /// On a cold start the durable snapshot is served immediately (no
    /// network) unless `force_refresh` is set. Otherwise a conditional
    /// fetch is issued with the last freshness token; a not-modified
    /// answer leaves everything untouched.
    ///
    /// On failure the error is returned, but whatever is currently
    /// displayable is preserved: the in-memory index if there is one,
    /// else the durable snapshot, else the cache enters [`CacheState::Error`].
    pub async fn fetch(&mut self, force_refresh: bool) -> Result<(), ApiError> {
        if !force_refresh && self.state == CacheState::Uninitialized {
            match self.persistence.load() {
                Ok(Some(entry)) => {
                    debug!(
                        items = entry.index.total_count,
                        "cold start served from durable cache"
                    );
                    self.index = Some(entry.index);
                    self.freshness_token = Some(entry.freshness_token);
                    self.state = CacheState::Ready;
                    return Ok(());
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "durable cache unreadable, fetching instead"),
            }
        }

        self.state = if self.index.is_some() {
            CacheState::Refreshing
        } else {
            CacheState::Loading
        };
        let token = if force_refresh {
            None
        } else {
            self.freshness_token.clone()
        };

        match self.api.fetch_index(token, false).await {
            Ok(FetchOutcome::NotModified) => {
                trace!("index not modified");
                self.state = CacheState::Ready;
                Ok(())
            }
            Ok(FetchOutcome::Fresh {
                index,
                freshness_token,
            }) => {
                debug!(items = index.total_count, "fresh index payload");
                self.adopt(index, freshness_token);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "index fetch failed");
                if self.index.is_some() {
                    // Keep showing what we have.
                    self.state = CacheState::Ready;
                } else if let Ok(Some(entry)) = self.persistence.load() {
                    info!("falling back to durable snapshot after failed fetch");
                    self.index = Some(entry.index);
                    self.freshness_token = Some(entry.freshness_token);
                    self.state = CacheState::Ready;
                } else {
                    self.state = CacheState::Error;
                }
                Err(err)
            }
        }
    }

    /// Clear the durable cache and freshness token without touching the
    /// in-memory view. Call on logout, on detected full-page reloads,
    /// and from explicit cache-busting paths, so the next `fetch` does
    /// a true refetch instead of resurrecting stale data.
    pub fn invalidate_cache(&mut self) -> Result<(), CacheError> {
        info!("invalidating durable index cache");
        self.freshness_token = None;
        self.persistence.clear()
    }

    /// Apply edits to the local view immediately, without the network.
    ///
    /// Advances `lastUpdated` locally and persists the edited copy so a
    /// reload within the round-trip window still sees it. Returns the
    /// compensating [`Rollback`]; the caller issues the real server
    /// mutation and applies the rollback if it fails. The cache stays in
    /// [`CacheState::Mutating`] until [`Self::commit`] or
    /// [`Self::rollback`] settles it.
    pub fn update_optimistically(&mut self, edits: &[IndexEdit]) -> Rollback {
        let mut index = self.index.take().unwrap_or_else(Index::empty);
        let mut inverses = Vec::with_capacity(edits.len());
        for edit in edits {
            inverses.push(index.apply(edit));
        }
        index.touch();
        trace!(
            edits = edits.len(),
            items = index.total_count,
            "optimistic update applied"
        );

        // The locally derived token was never issued by the server; at
        // worst the next conditional fetch misses and does a real read.
        self.store(index);
        self.state = CacheState::Mutating;
        Rollback { inverses }
    }

    /// Undo an optimistic update after the server call failed. The
    /// inverses are applied in reverse order, restoring exactly the
    /// pre-edit view.
    pub fn rollback(&mut self, rollback: Rollback) {
        debug!(edits = rollback.inverses.len(), "rolling back optimistic update");
        let mut index = self.index.take().unwrap_or_else(Index::empty);
        for inverse in rollback.inverses.iter().rev() {
            index.apply(inverse);
        }
        index.touch();
        self.store(index);
        self.state = CacheState::Ready;
    }

    /// Adopt the server's echoed canonical copy as the new cache state.
    ///
    /// Callers of the overwrite endpoint and the batch endpoints commit
    /// the *returned* index, never their own locally computed candidate.
    pub fn commit(&mut self, index: Index) {
        let token = index.freshness_token();
        self.adopt(index, token);
    }

    fn adopt(&mut self, index: Index, freshness_token: String) {
        if let Err(err) = self.persistence.save(&CachedIndexEntry {
            index: index.clone(),
            freshness_token: freshness_token.clone(),
        }) {
            warn!(%err, "durable cache save failed, continuing with memory only");
        }
        self.index = Some(index);
        self.freshness_token = Some(freshness_token);
        self.state = CacheState::Ready;
    }

    fn store(&mut self, index: Index) {
        let token = index.freshness_token();
        if let Err(err) = self.persistence.save(&CachedIndexEntry {
            index: index.clone(),
            freshness_token: token.clone(),
        }) {
            warn!(%err, "durable cache save failed, continuing with memory only");
        }
        self.index = Some(index);
        self.freshness_token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    use zukan_types::wire::{
        BatchDeleteResponse, BatchLikeResponse, OverwriteRequest, OverwriteResponse,
    };
    use zukan_types::IndexItem;

    use crate::storage::MemoryCacheStorage;

    /// Scripted fetch responses + a record of presented tokens.
    #[derive(Default)]
    struct ScriptedApi {
        responses: Mutex<VecDeque<Result<FetchOutcome, ApiError>>>,
        presented_tokens: Mutex<Vec<Option<String>>>,
        /// When set, the first `hang_first` fetches never resolve.
        hang_first: AtomicUsize,
    }

    impl ScriptedApi {
        fn push(&self, response: Result<FetchOutcome, ApiError>) {
            self.responses.lock().push_back(response);
        }

        fn fetch_count(&self) -> usize {
            self.presented_tokens.lock().len()
        }
    }

    #[async_trait]
    impl GalleryApi for ScriptedApi {
        async fn fetch_index(
            &self,
            if_none_match: Option<String>,
            _rebuild: bool,
        ) -> Result<FetchOutcome, ApiError> {
            self.presented_tokens.lock().push(if_none_match);
            if self
                .hang_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                std::future::pending::<()>().await;
            }
            self.responses
                .lock()
                .pop_front()
                .expect("unexpected fetch_index call")
        }

        async fn overwrite_index(
            &self,
            _req: OverwriteRequest,
        ) -> Result<OverwriteResponse, ApiError> {
            panic!("overwrite_index not used by cache tests")
        }

        async fn batch_delete(
            &self,
            _file_names: Vec<String>,
        ) -> Result<BatchDeleteResponse, ApiError> {
            panic!("batch_delete not used by cache tests")
        }

        async fn batch_toggle_likes(
            &self,
            _file_names: Vec<String>,
            _liked: bool,
        ) -> Result<BatchLikeResponse, ApiError> {
            panic!("batch_toggle_likes not used by cache tests")
        }
    }

    fn item(name: &str) -> IndexItem {
        IndexItem::new(name, 100, Utc::now())
    }

    fn index_with(names: &[&str]) -> Index {
        let mut index = Index::empty();
        for name in names {
            index.images.push(item(name));
        }
        index.recompute_counts();
        index
    }

    fn fresh(index: Index) -> FetchOutcome {
        let freshness_token = index.freshness_token();
        FetchOutcome::Fresh {
            index,
            freshness_token,
        }
    }

    fn cache(api: Arc<ScriptedApi>) -> IndexCache<ScriptedApi, MemoryCacheStorage> {
        IndexCache::new(api, MemoryCacheStorage::new())
    }

    // ── Cold start ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cold_start_without_durable_copy_loads() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        let mut cache = cache(api.clone());

        assert_eq!(cache.state(), CacheState::Uninitialized);
        cache.fetch(false).await.unwrap();

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap().total_count, 1);
        // First fetch carries no token.
        assert_eq!(api.presented_tokens.lock()[0], None);
    }

    #[tokio::test]
    async fn test_cold_start_serves_durable_copy_without_network() {
        let api = Arc::new(ScriptedApi::default());
        let storage = MemoryCacheStorage::new();
        let index = index_with(&["a.jpg", "b.jpg"]);
        storage
            .save(&CachedIndexEntry {
                freshness_token: index.freshness_token(),
                index,
            })
            .unwrap();

        let mut cache = IndexCache::new(api.clone(), storage);
        cache.fetch(false).await.unwrap();

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap().total_count, 2);
        assert_eq!(api.fetch_count(), 0, "durable hit must skip the network");
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_durable_copy_and_token() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        api.push(Ok(fresh(index_with(&["a.jpg", "b.jpg"]))));
        let mut cache = cache(api.clone());

        cache.fetch(false).await.unwrap();
        cache.fetch(true).await.unwrap();

        assert_eq!(cache.index().unwrap().total_count, 2);
        // Forced fetch presents no token; a full payload is wanted.
        assert_eq!(api.presented_tokens.lock()[1], None);
    }

    // ── Conditional refresh ───────────────────────────────────────────

    #[tokio::test]
    async fn test_not_modified_leaves_state_untouched() {
        let api = Arc::new(ScriptedApi::default());
        let index = index_with(&["a.jpg"]);
        let token = index.freshness_token();
        api.push(Ok(fresh(index)));
        api.push(Ok(FetchOutcome::NotModified));
        let mut cache = cache(api.clone());

        cache.fetch(false).await.unwrap();
        cache.fetch(false).await.unwrap();

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap().total_count, 1);
        // Second fetch presented the stored token.
        assert_eq!(api.presented_tokens.lock()[1], Some(token));
    }

    // ── Failure fallbacks ─────────────────────────────────────────────

    #[tokio::test]
    async fn test_refresh_failure_keeps_displayed_view() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        api.push(Err(ApiError::Network("connection reset".to_string())));
        let mut cache = cache(api.clone());

        cache.fetch(false).await.unwrap();
        let err = cache.fetch(false).await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(cache.state(), CacheState::Ready, "view survives the failure");
        assert_eq!(cache.index().unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_forced_fetch_failure_falls_back_to_durable_snapshot() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Err(ApiError::Network("offline".to_string())));

        let storage = MemoryCacheStorage::new();
        let index = index_with(&["a.jpg"]);
        storage
            .save(&CachedIndexEntry {
                freshness_token: index.freshness_token(),
                index,
            })
            .unwrap();

        let mut cache = IndexCache::new(api.clone(), storage);
        let err = cache.fetch(true).await.unwrap_err();

        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap().total_count, 1);
    }

    #[tokio::test]
    async fn test_failure_with_nothing_to_show_is_error_state() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Err(ApiError::Network("offline".to_string())));
        let mut cache = cache(api.clone());

        cache.fetch(false).await.unwrap_err();
        assert_eq!(cache.state(), CacheState::Error);
        assert!(cache.index().is_none());
    }

    // ── Cancellation ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_dropped_fetch_is_cancelled_cleanly() {
        let api = Arc::new(ScriptedApi::default());
        api.hang_first.store(1, Ordering::SeqCst);
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        let mut cache = cache(api.clone());

        {
            let fut = cache.fetch(false);
            tokio::pin!(fut);
            // Poll once so the request is actually in flight, then drop.
            tokio::select! {
                _ = &mut fut => panic!("gated fetch must not complete"),
                _ = tokio::task::yield_now() => {}
            }
        }

        // The replacement fetch proceeds normally; the stale response
        // can never be applied because its future is gone.
        cache.fetch(false).await.unwrap();
        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap().total_count, 1);
        assert_eq!(api.fetch_count(), 2);
    }

    // ── Invalidation ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_invalidate_clears_durable_and_token_only() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        let mut cache = cache(api.clone());

        cache.fetch(false).await.unwrap();
        cache.invalidate_cache().unwrap();

        // In-memory view untouched, token gone.
        assert_eq!(cache.index().unwrap().total_count, 1);
        assert!(cache.freshness_token().is_none());

        // Next fetch is a true refetch: no token presented.
        cache.fetch(false).await.unwrap();
        assert_eq!(api.presented_tokens.lock()[1], None);
    }

    // ── Optimistic updates ────────────────────────────────────────────

    #[tokio::test]
    async fn test_optimistic_update_and_rollback() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg", "b.jpg"]))));
        let mut cache = cache(api.clone());
        cache.fetch(false).await.unwrap();

        let before = cache.index().unwrap().clone();

        let rollback = cache.update_optimistically(&[
            IndexEdit::Remove {
                file_names: vec!["a.jpg".to_string()],
            },
            IndexEdit::SetLiked {
                file_names: vec!["b.jpg".to_string()],
                liked: true,
            },
        ]);
        assert_eq!(cache.state(), CacheState::Mutating);
        let view = cache.index().unwrap();
        assert_eq!(view.total_count, 1);
        assert_eq!(view.liked_count, 1);
        assert!(view.last_updated > before.last_updated);

        // Server call "failed", roll back.
        cache.rollback(rollback);
        assert_eq!(cache.state(), CacheState::Ready);
        let restored = cache.index().unwrap();
        assert_eq!(restored.total_count, 2);
        assert_eq!(restored.liked_count, 0);
        assert!(restored.contains("a.jpg"));
    }

    #[tokio::test]
    async fn test_optimistic_update_persists_durably() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        let storage = MemoryCacheStorage::new();
        let mut cache = IndexCache::new(api.clone(), storage);
        cache.fetch(false).await.unwrap();

        let _rollback = cache.update_optimistically(&[IndexEdit::Add {
            items: vec![item("b.jpg")],
        }]);

        // A reload within the round-trip window sees the optimistic copy.
        let entry = cache.persistence.load().unwrap().unwrap();
        assert_eq!(entry.index.total_count, 2);
    }

    #[tokio::test]
    async fn test_commit_adopts_server_copy() {
        let api = Arc::new(ScriptedApi::default());
        api.push(Ok(fresh(index_with(&["a.jpg"]))));
        let mut cache = cache(api.clone());
        cache.fetch(false).await.unwrap();

        let _rollback = cache.update_optimistically(&[IndexEdit::Add {
            items: vec![item("b.jpg")],
        }]);

        // The server echoes its canonical copy; it wins over the local one.
        let server_copy = index_with(&["a.jpg", "b.jpg", "c.jpg"]);
        cache.commit(server_copy.clone());

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.index().unwrap(), &server_copy);
        assert_eq!(
            cache.freshness_token().unwrap(),
            server_copy.freshness_token()
        );
    }
}
