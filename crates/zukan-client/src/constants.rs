//! Client configuration constants.
//!
//! Centralizes the tunables so embedders can see the latency tradeoffs
//! in one place; both live in [`CoalescerConfig`](crate::CoalescerConfig)
//! rather than being read from here at call sites.

use std::time::Duration;

/// Debounce window after the last enqueue before a flush fires. Small
/// enough to feel instant, long enough to fold a burst of multi-select
/// actions into one request.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Queue size that triggers an immediate flush without waiting for the
/// debounce window.
pub const DEFAULT_MAX_BATCH: usize = 50;
