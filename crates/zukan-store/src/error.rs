//! Error types for the storage layer.

use thiserror::Error;
use zukan_types::IndexError;

/// Failure talking to the backing blob store.
///
/// Backends map their native transport/service errors into this; the
/// store layer treats every variant as transient and propagates it
/// unchanged to the caller.
#[derive(Error, Debug, Clone)]
pub enum ObjectStoreError {
    /// Network or service failure on get/put/delete/head/list.
    #[error("object storage: {0}")]
    Backend(String),
}

/// Failure in the index store.
#[derive(Error, Debug)]
pub enum IndexStoreError {
    /// The backing store failed outright (put, or a verify read).
    /// Distinct from [`IndexStoreError::VerificationFailed`]: here we
    /// never got an answer, there we got answers that didn't match.
    #[error("index persistence: {0}")]
    Storage(#[from] ObjectStoreError),

    /// The stored index document exists but cannot be parsed.
    #[error("index document corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    /// A replacement document failed structural validation.
    #[error("index rejected: {0}")]
    Invalid(#[from] IndexError),

    /// Every read-back disagreed with the just-written document.
    /// The mutation must not be assumed durable; optimistic client
    /// state based on it has to be rolled back.
    #[error("write verification failed after {attempts} read-back attempts")]
    VerificationFailed { attempts: u32 },
}
