//! Error type shared by the planner, the batch store and the session entry points.
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cancellation requested")]
    Cancelled,
    #[error("batch store not ready: {0}")]
    StoreNotReady(String),
    #[error("failed to serialize batch {key}")]
    SerializationFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write batch {key}")]
    StoreWriteFailed {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to delete batches")]
    StoreDeleteFailed(#[source] BoxError),
    #[error("failed to read batch {key}")]
    StoreReadFailed {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("batch {0} not found")]
    BatchNotFound(String),
    #[error("batch {key} holds an unreadable payload")]
    CorruptBatch {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}
