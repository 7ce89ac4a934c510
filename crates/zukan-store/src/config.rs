//! Store configuration.
//!
//! The verification retry budget and backoff encode a consistency/latency
//! tradeoff against the backing store's actual convergence time, so they
//! are configuration rather than constants baked into call sites.

use std::time::Duration;

/// Object-store key holding the serialized index document.
pub const DEFAULT_INDEX_KEY: &str = "index.json";

/// Key namespace for derived thumbnail objects. Excluded from rebuilds.
pub const DEFAULT_THUMBNAIL_PREFIX: &str = "thumbs/";

/// Key namespace for legacy favorite-marker objects. Excluded from rebuilds.
pub const DEFAULT_FAVORITE_PREFIX: &str = "favorites/";

/// How long a memoized index copy is served before re-reading storage.
pub const DEFAULT_MEMO_TTL: Duration = Duration::from_secs(120);

/// Read-back attempts before a write is declared unverified.
pub const DEFAULT_VERIFY_ATTEMPTS: u32 = 3;

/// Pause between read-back attempts. Sized to the typical convergence
/// window of the backing store, not to zero; an immediate re-read mostly
/// observes the same stale replica.
pub const DEFAULT_VERIFY_BACKOFF: Duration = Duration::from_millis(150);

/// Tunables and key layout for the index store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key of the index document.
    pub index_key: String,
    /// Prefix of derived thumbnail objects.
    pub thumbnail_prefix: String,
    /// Prefix of favorite-marker objects.
    pub favorite_prefix: String,
    /// TTL of the in-process memo cache.
    pub memo_ttl: Duration,
    /// Read-back attempts per verified write.
    pub verify_attempts: u32,
    /// Pause between read-back attempts.
    pub verify_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_key: DEFAULT_INDEX_KEY.to_string(),
            thumbnail_prefix: DEFAULT_THUMBNAIL_PREFIX.to_string(),
            favorite_prefix: DEFAULT_FAVORITE_PREFIX.to_string(),
            memo_ttl: DEFAULT_MEMO_TTL,
            verify_attempts: DEFAULT_VERIFY_ATTEMPTS,
            verify_backoff: DEFAULT_VERIFY_BACKOFF,
        }
    }
}

impl StoreConfig {
    /// Whether a listed key is a raw catalog object: not a thumbnail,
    /// not a favorite marker, not the index document itself.
    pub fn is_raw_object(&self, key: &str) -> bool {
        key != self.index_key
            && !key.starts_with(&self.thumbnail_prefix)
            && !key.starts_with(&self.favorite_prefix)
    }

    /// Derived thumbnail key for a catalog object.
    pub fn thumbnail_key(&self, file_name: &str) -> String {
        format!("{}{}", self.thumbnail_prefix, file_name)
    }
}
