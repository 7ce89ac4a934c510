//! The mutation coalescer.
//!
//! Reduces N rapid user actions (multi-select delete, multi-select like)
//! to the minimum number of network round-trips. Intents are queued per
//! `file_name`, one pending operation per key, with later intents replacing
//! earlier ones except that a pending delete is terminal and never
//! displaced by a toggle.
//!
//! A flush fires when the debounce window elapses after the last enqueue
//! or when the queue reaches the max batch size, whichever comes first;
//! the size cap flushes immediately. Exactly one flush runs at a time.
//! Enqueues during an in-flight flush start a fresh queue and wait for
//! the next debounce cycle after the flush completes.
//!
//! Flushes are all-or-nothing toward callers: if any group request
//! fails, every callback from that cycle sees failure, and no partial
//! rollback of groups that already landed is attempted. Compensation
//! for the optimistic view belongs to the cache layer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use zukan_types::{Index, Operation, OperationKind};

use crate::api::GalleryApi;
use crate::constants::{DEFAULT_DEBOUNCE, DEFAULT_MAX_BATCH};

/// Flush pacing knobs.
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Quiet period after the last enqueue before a flush fires.
    pub debounce: Duration,
    /// Queue size that triggers an immediate flush.
    pub max_batch: usize,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

/// What every queued callback learns about its flush cycle.
///
/// `index` is the index returned by the last group request that carried
/// one; a delete-only flush reports success without an index (the batch
/// delete endpoint returns none) and callers keep their optimistic view
/// until the next fetch.
#[derive(Debug, Clone)]
pub struct FlushOutcome {
    pub success: bool,
    pub index: Option<Index>,
}

/// Per-intent completion callback.
pub type FlushCallback = Box<dyn FnOnce(FlushOutcome) + Send + 'static>;

/// Debounced, delete-wins mutation queue.
///
/// Cheap to clone (shared handle). Needs a tokio runtime: debounce
/// timers and flushes run on spawned tasks.
pub struct MutationCoalescer<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for MutationCoalescer<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<A> {
    api: Arc<A>,
    config: CoalescerConfig,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    /// One pending operation per key.
    pending: HashMap<String, Operation>,
    /// Callbacks collected for the current cycle.
    callbacks: Vec<FlushCallback>,
    /// Bumped on every enqueue; a debounce timer only fires if the
    /// queue was quiet for its whole window.
    epoch: u64,
    /// A flush is in flight; no new flush may start.
    flushing: bool,
}

/// Snapshot taken when a flush is initiated. The live queue is empty
/// afterwards; enqueues during the flush accumulate for the next cycle.
struct FlushBatch {
    ops: Vec<Operation>,
    callbacks: Vec<FlushCallback>,
}

impl QueueState {
    fn take_batch(&mut self) -> FlushBatch {
        let mut ops: Vec<Operation> = self.pending.drain().map(|(_, op)| op).collect();
        ops.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        FlushBatch {
            ops,
            callbacks: std::mem::take(&mut self.callbacks),
        }
    }
}

impl<A: GalleryApi> MutationCoalescer<A> {
    pub fn new(api: Arc<A>, config: CoalescerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Queue an intent without a completion callback.
    pub fn enqueue(&self, op: Operation) {
        self.enqueue_impl(op, None);
    }

    /// Queue an intent; the callback fires when its flush cycle settles.
    pub fn enqueue_with_callback(
        &self,
        op: Operation,
        callback: impl FnOnce(FlushOutcome) + Send + 'static,
    ) {
        self.enqueue_impl(op, Some(Box::new(callback)));
    }

    /// Intents currently waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    fn enqueue_impl(&self, op: Operation, callback: Option<FlushCallback>) {
        let mut immediate = None;
        let mut debounce_epoch = None;
        {
            let mut st = self.inner.state.lock();
            let replaces = st
                .pending
                .get(&op.file_name)
                .map_or(true, |pending| op.kind.displaces(pending.kind));
            if replaces {
                st.pending.insert(op.file_name.clone(), op);
            } else {
                trace!(file = %op.file_name, "pending delete is terminal, dropping toggle");
            }
            if let Some(cb) = callback {
                st.callbacks.push(cb);
            }
            st.epoch += 1;

            if st.flushing {
                // In-flight flush reschedules on completion.
            } else if st.pending.len() >= self.inner.config.max_batch {
                st.flushing = true;
                immediate = Some(st.take_batch());
            } else {
                debounce_epoch = Some(st.epoch);
            }
        }

        if let Some(batch) = immediate {
            debug!(
                ops = batch.ops.len(),
                "queue reached max batch size, flushing immediately"
            );
            let inner = self.inner.clone();
            tokio::spawn(async move {
                Inner::run_flush(inner, batch).await;
            });
        } else if let Some(epoch) = debounce_epoch {
            Inner::spawn_debounce(self.inner.clone(), epoch);
        }
    }
}

impl<A: GalleryApi> Inner<A> {
    /// Arm a debounce timer for `epoch`. The timer is a no-op if the
    /// queue saw any enqueue since (a newer timer owns the window), or
    /// if a flush claimed the queue first.
    fn spawn_debounce(inner: Arc<Self>, epoch: u64) {
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            let batch = {
                let mut st = inner.state.lock();
                if st.epoch == epoch && !st.flushing && !st.pending.is_empty() {
                    st.flushing = true;
                    Some(st.take_batch())
                } else {
                    None
                }
            };
            if let Some(batch) = batch {
                Self::run_flush(inner, batch).await;
            }
        });
    }

    async fn run_flush(inner: Arc<Self>, batch: FlushBatch) {
        let mut deletes = Vec::new();
        let mut likes = Vec::new();
        let mut unlikes = Vec::new();
        for op in &batch.ops {
            match op.kind {
                OperationKind::Delete => deletes.push(op.file_name.clone()),
                OperationKind::Like => likes.push(op.file_name.clone()),
                OperationKind::Unlike => unlikes.push(op.file_name.clone()),
            }
        }
        // Deletion is terminal: a deleted key never rides in a toggle group.
        likes.retain(|n| !deletes.contains(n));
        unlikes.retain(|n| !deletes.contains(n));

        debug!(
            deletes = deletes.len(),
            likes = likes.len(),
            unlikes = unlikes.len(),
            "flushing mutation groups"
        );

        let mut success = true;
        let mut final_index: Option<Index> = None;

        if !deletes.is_empty() {
            match inner.api.batch_delete(deletes).await {
                Ok(resp) if resp.success => {}
                Ok(resp) => {
                    warn!(message = %resp.message, "batch delete rejected");
                    success = false;
                }
                Err(err) => {
                    warn!(%err, "batch delete failed");
                    success = false;
                }
            }
        }
        for (group, liked) in [(likes, true), (unlikes, false)] {
            if !success || group.is_empty() {
                continue;
            }
            match inner.api.batch_toggle_likes(group, liked).await {
                Ok(resp) if resp.success => final_index = Some(resp.new_index),
                Ok(resp) => {
                    warn!(message = %resp.message, liked, "batch toggle rejected");
                    success = false;
                }
                Err(err) => {
                    warn!(%err, liked, "batch toggle failed");
                    success = false;
                }
            }
        }

        let outcome = FlushOutcome {
            success,
            index: final_index,
        };
        for callback in batch.callbacks {
            callback(outcome.clone());
        }

        // Release the flush slot. Anything queued while we ran waits for
        // its own debounce window.
        let next_epoch = {
            let mut st = inner.state.lock();
            st.flushing = false;
            (!st.pending.is_empty()).then_some(st.epoch)
        };
        if let Some(epoch) = next_epoch {
            trace!("items queued during flush, arming next debounce cycle");
            Self::spawn_debounce(inner, epoch);
        }
    }
}
