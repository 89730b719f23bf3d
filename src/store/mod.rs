//! Batch store: a minimal key/value contract with per-key expiry.
//!
//! - `BatchStore` is what the planner and the session entry points talk to.
//! - `sqlite`: the durable implementation backed by an sqlx SQLite pool.
//!
//! Implementations never retry; retry policy belongs to whoever invokes the tasks.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::SyncError;

pub mod sqlite;

pub use sqlite::SqliteBatchStore;

/// How long a written batch survives when nobody releases it.
pub const BATCH_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[async_trait]
pub trait BatchStore: Send + Sync {
    /// Connectivity check; fails with `StoreNotReady`.
    async fn ping(&self) -> Result<(), SyncError>;

    /// Write `payload` under `key`, replacing any previous value, expiring after `ttl`.
    async fn put(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<(), SyncError>;

    /// Read a live (not yet expired) value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError>;

    /// Delete every key in `keys`. Missing or expired keys are skipped.
    /// Returns how many live entries were removed.
    async fn delete_all(&self, keys: &[String]) -> Result<u64, SyncError>;
}
