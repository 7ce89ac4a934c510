//! The authoritative index store.
//!
//! Owns the canonical index document: one JSON object at a well-known
//! key in the backing blob store, memoized in-process behind a short TTL.
//! Every mutation goes through the same pipeline: apply the field-level
//! edit, advance `lastUpdated`, then persist with write-then-verify.
//!
//! # Why verify at all
//!
//! The backing store offers nothing stronger than eventual consistency,
//! so a put that "succeeded" may not be what the next reader sees. After
//! every put we re-read the key a bounded number of times and compare
//! `totalCount` + `lastUpdated` against what we just wrote. Any match →
//! the write is considered durable and the memo is refreshed. No match
//! within the budget → the operation fails loudly and the memo is left
//! alone; callers must not assume the mutation landed. This detects
//! racing writers and non-converging replicas; it does not prevent them.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use zukan_types::wire::WriteStats;
use zukan_types::{advance_timestamp, Index, IndexEdit, IndexItem, INDEX_SCHEMA_VERSION};

use crate::config::StoreConfig;
use crate::error::IndexStoreError;
use crate::object_store::{ObjectStore, CONTENT_TYPE_JSON, META_HEIGHT, META_WIDTH};

struct Memo {
    index: Index,
    fetched_at: Instant,
}

/// Authoritative server-side index store.
///
/// Construct one per process and inject it where needed. There is no
/// ambient global instance; tests build isolated stores freely.
/// Request-scoped callers share it behind an `Arc`; the only internal
/// state is the memo, and persistence correctness never depends on it.
pub struct IndexStore<S> {
    objects: Arc<S>,
    config: StoreConfig,
    memo: Mutex<Option<Memo>>,
}

impl<S: ObjectStore> IndexStore<S> {
    pub fn new(objects: Arc<S>, config: StoreConfig) -> Self {
        Self {
            objects,
            config,
            memo: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current index: memoized copy while fresh, else a storage read.
    /// An absent index key is the bootstrap case and yields an empty
    /// index, not an error.
    pub async fn get(&self) -> Result<Index, IndexStoreError> {
        if let Some(memo) = self.memo.lock().as_ref() {
            if memo.fetched_at.elapsed() < self.config.memo_ttl {
                trace!("serving memoized index");
                return Ok(memo.index.clone());
            }
        }
        let index = self.load().await?;
        self.remember(&index);
        Ok(index)
    }

    /// Reconstruct the index from the raw object listing.
    ///
    /// Thumbnails, favorite markers, and the index document itself are
    /// excluded; each surviving object is head-requested for size,
    /// timestamp, and opportunistic dimensions. Liked flags are carried
    /// over from the previous index by `file_name`; a rebuild must never
    /// silently un-favorite items. Items are ordered by upload time,
    /// newest first.
    pub async fn rebuild(&self) -> Result<Index, IndexStoreError> {
        let previous = match self.load().await {
            Ok(index) => index,
            Err(err) => {
                warn!(%err, "previous index unreadable, rebuilding without like history");
                Index::empty()
            }
        };

        let listing = self.objects.list_objects("").await?;
        let mut items = Vec::new();
        for summary in listing {
            if !self.config.is_raw_object(&summary.key) {
                continue;
            }
            let Some(meta) = self.objects.head_object(&summary.key).await? else {
                // Listings are eventually consistent; the object may be gone.
                debug!(key = %summary.key, "listed object vanished before head, skipping");
                continue;
            };
            let mut item = IndexItem::new(&summary.key, meta.size, meta.last_modified);
            item.width = meta.metadata.get(META_WIDTH).and_then(|v| v.parse().ok());
            item.height = meta.metadata.get(META_HEIGHT).and_then(|v| v.parse().ok());
            item.is_liked = previous
                .get(&summary.key)
                .map(|prev| prev.is_liked)
                .unwrap_or(false);
            items.push(item);
        }
        items.sort_by(|a, b| {
            b.upload_time
                .cmp(&a.upload_time)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

        let mut index = Index {
            version: INDEX_SCHEMA_VERSION.to_string(),
            last_updated: advance_timestamp(previous.last_updated, chrono::Utc::now()),
            total_count: 0,
            liked_count: 0,
            images: items,
        };
        index.recompute_counts();

        info!(
            total = index.total_count,
            liked = index.liked_count,
            "rebuilt index from object listing"
        );
        self.persist_verified(&index).await?;
        Ok(index)
    }

    /// Merge new items into the index, dropping ones already present.
    pub async fn add(&self, items: Vec<IndexItem>) -> Result<Index, IndexStoreError> {
        self.mutate(&IndexEdit::Add { items }).await
    }

    /// Remove items by identity. Keys absent from the index are
    /// tolerated; the removal succeeds for the subset present.
    pub async fn remove(&self, file_names: &[String]) -> Result<Index, IndexStoreError> {
        self.mutate(&IndexEdit::Remove {
            file_names: file_names.to_vec(),
        })
        .await
    }

    /// Set the liked flag for the given items; no-ops for items already
    /// in the target state and for absent keys.
    pub async fn toggle_likes(
        &self,
        file_names: &[String],
        liked: bool,
    ) -> Result<Index, IndexStoreError> {
        self.mutate(&IndexEdit::SetLiked {
            file_names: file_names.to_vec(),
            liked,
        })
        .await
    }

    /// Full-document replace: the overwrite endpoint's path.
    ///
    /// Validates structural invariants, restamps `lastUpdated` past the
    /// current server copy so monotonicity survives client clock skew,
    /// and persists through the same verified-write pipeline. No semantic
    /// diffing against the previous document is performed.
    pub async fn replace(&self, mut index: Index) -> Result<(Index, WriteStats), IndexStoreError> {
        index.validate()?;
        let current = self.get().await?;
        index.last_updated = advance_timestamp(
            current.last_updated.max(index.last_updated),
            chrono::Utc::now(),
        );
        let stats = self.persist_verified(&index).await?;
        Ok((index, stats))
    }

    async fn mutate(&self, edit: &IndexEdit) -> Result<Index, IndexStoreError> {
        let mut index = self.get().await?;
        index.apply(edit);
        index.touch();
        self.persist_verified(&index).await?;
        Ok(index)
    }

    async fn load(&self) -> Result<Index, IndexStoreError> {
        match self.objects.get_object(&self.config.index_key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                info!(key = %self.config.index_key, "index key absent, bootstrapping empty index");
                Ok(Index::empty())
            }
        }
    }

    fn remember(&self, index: &Index) {
        *self.memo.lock() = Some(Memo {
            index: index.clone(),
            fetched_at: Instant::now(),
        });
    }

    /// Serialize, put, then read back until the stored document matches
    /// what we wrote (`totalCount` + `lastUpdated`) or the attempt budget
    /// runs out. The memo is refreshed only on a verified write.
    async fn persist_verified(&self, index: &Index) -> Result<WriteStats, IndexStoreError> {
        let body = serde_json::to_vec_pretty(index)?;
        let started = Instant::now();
        self.objects
            .put_object(&self.config.index_key, body, CONTENT_TYPE_JSON)
            .await?;
        let write_time_ms = started.elapsed().as_millis() as u64;

        for attempt in 1..=self.config.verify_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.config.verify_backoff).await;
            }
            match self.objects.get_object(&self.config.index_key).await? {
                Some(bytes) => match serde_json::from_slice::<Index>(&bytes) {
                    Ok(readback)
                        if readback.total_count == index.total_count
                            && readback.last_updated == index.last_updated =>
                    {
                        trace!(attempt, "write verified");
                        self.remember(index);
                        return Ok(WriteStats {
                            write_time_ms,
                            total_time_ms: started.elapsed().as_millis() as u64,
                            verify_attempts: attempt,
                        });
                    }
                    Ok(readback) => {
                        warn!(
                            attempt,
                            wrote = %index.last_updated,
                            read = %readback.last_updated,
                            "read-back does not match written index yet"
                        );
                    }
                    Err(err) => {
                        warn!(attempt, %err, "read-back not parseable yet");
                    }
                },
                None => {
                    warn!(attempt, "read-back found no index document yet");
                }
            }
        }

        warn!(
            attempts = self.config.verify_attempts,
            "write verification exhausted, mutation must not be assumed durable"
        );
        Err(IndexStoreError::VerificationFailed {
            attempts: self.config.verify_attempts,
        })
    }
}
