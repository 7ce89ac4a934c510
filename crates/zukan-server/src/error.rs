//! Handler-level errors.

use chrono::{DateTime, Utc};
use thiserror::Error;
use zukan_store::{IndexStoreError, ObjectStoreError};
use zukan_types::ErrorResponse;

/// Failure of a service handler.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The index store failed (persistence, verification, validation).
    #[error("index store: {0}")]
    Store(#[from] IndexStoreError),

    /// A raw object operation failed (batch delete touching objects).
    #[error("object storage: {0}")]
    Storage(#[from] ObjectStoreError),

    /// Optimistic-concurrency precondition failed: the server index
    /// advanced past the base the caller computed from. The caller must
    /// refetch and recompute rather than retry blindly.
    #[error("index advanced past caller's base ({base} < {current}), refusing replace")]
    StaleWrite {
        base: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl From<&ServiceError> for ErrorResponse {
    fn from(err: &ServiceError) -> Self {
        ErrorResponse::new(err)
    }
}
