//! Remotely-invoked tasks of a drive sync run.
//!
//! An orchestrator calls [`SyncController::sync_drives_and_batch`] once per
//! session, hands each returned key to a worker (which reads it back with
//! [`SyncController::load_batch`]) and finally calls
//! [`SyncController::release_batches`] with the same keys. The orchestrator
//! owns sequencing and retries; nothing here enforces that order.

use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::directory::DriveDirectory;
use crate::error::SyncError;
use crate::model::SyncSettings;
use crate::planner::{BatchPlanner, PlannedBatch};
use crate::store::BatchStore;

/// Identifier for a new sync session of `integration_id`.
pub fn new_session_id(integration_id: &str) -> String {
    format!("sync-session-{}-{}", integration_id, Utc::now().timestamp_millis())
}

pub struct SyncController {
    planner: BatchPlanner,
    store: Arc<dyn BatchStore>,
}

impl SyncController {
    pub fn new(store: Arc<dyn BatchStore>, directory: Arc<dyn DriveDirectory>) -> Self {
        Self {
            planner: BatchPlanner::new(store.clone(), directory),
            store,
        }
    }

    async fn preflight(&self, cancel: &CancellationToken) -> Result<(), SyncError> {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }
        self.store.ping().await
    }

    /// Plan and persist the batches of one session, returning their keys in ordinal order.
    pub async fn sync_drives_and_batch(
        &self,
        cancel: &CancellationToken,
        integration_id: &str,
        session_id: &str,
        settings: &SyncSettings,
    ) -> Result<Vec<String>, SyncError> {
        let planned = self
            .plan_batches(cancel, integration_id, session_id, settings)
            .await?;
        Ok(planned.into_iter().map(|batch| batch.key).collect())
    }

    /// Like [`sync_drives_and_batch`](Self::sync_drives_and_batch) but keeps the
    /// per-batch drive counts and effective file settings.
    #[instrument(skip(self, cancel, settings))]
    pub async fn plan_batches(
        &self,
        cancel: &CancellationToken,
        integration_id: &str,
        session_id: &str,
        settings: &SyncSettings,
    ) -> Result<Vec<PlannedBatch>, SyncError> {
        self.preflight(cancel).await?;
        self.planner.plan(integration_id, session_id, settings).await
    }

    /// Delete the given batches. Keys that are already gone are ignored.
    #[instrument(skip_all, fields(keys = batch_keys.len()))]
    pub async fn release_batches(
        &self,
        cancel: &CancellationToken,
        batch_keys: &[String],
    ) -> Result<(), SyncError> {
        self.preflight(cancel).await?;
        let removed = self.store.delete_all(batch_keys).await?;
        info!(removed, "batches released");
        Ok(())
    }

    /// Drive identifiers stored under `batch_key`.
    #[instrument(skip(self, cancel))]
    pub async fn load_batch(
        &self,
        cancel: &CancellationToken,
        batch_key: &str,
    ) -> Result<Vec<String>, SyncError> {
        self.preflight(cancel).await?;
        let payload = self
            .store
            .get(batch_key)
            .await?
            .ok_or_else(|| SyncError::BatchNotFound(batch_key.to_string()))?;
        let drives: Vec<String> =
            serde_json::from_slice(&payload).map_err(|source| SyncError::CorruptBatch {
                key: batch_key.to_string(),
                source,
            })?;
        debug!(drives = drives.len(), "batch loaded");
        Ok(drives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_embeds_integration() {
        let id = new_session_id("acme");
        let millis = id.strip_prefix("sync-session-acme-").unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
    }
}
