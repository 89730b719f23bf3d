use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::directory::DriveDirectory;
use crate::error::SyncError;
use crate::model::{FileSyncSettings, SyncSettings};
use crate::store::{BatchStore, BATCH_TTL};

pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Key under which batch `ordinal` of a session is stored.
pub fn batch_key(integration_id: &str, session_id: &str, ordinal: usize) -> String {
    format!("{integration_id}-{session_id}-batch-{ordinal}")
}

/// One persisted batch as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedBatch {
    pub key: String,
    pub drive_count: usize,
    /// Least-restrictive combination of every drive group's file settings.
    pub file_settings: Option<FileSyncSettings>,
}

/// Splits the drives of a sync request into fixed-size batches and persists them.
pub struct BatchPlanner {
    store: Arc<dyn BatchStore>,
    directory: Arc<dyn DriveDirectory>,
}

impl BatchPlanner {
    pub fn new(store: Arc<dyn BatchStore>, directory: Arc<dyn DriveDirectory>) -> Self {
        Self { store, directory }
    }

    /// Enumerate, partition and write the batches of one session.
    ///
    /// Every enumerated drive lands in exactly one batch, in enumeration
    /// order. `namePatterns` are carried as data and never filter drives.
    ///
    /// Batches are written one after another in ordinal order. The first
    /// failure aborts the plan; batches written before it are left in the
    /// store and expire with their TTL.
    #[instrument(skip(self, settings))]
    pub async fn plan(
        &self,
        integration_id: &str,
        session_id: &str,
        settings: &SyncSettings,
    ) -> Result<Vec<PlannedBatch>, SyncError> {
        let batch_size = settings.effective_batch_size(DEFAULT_BATCH_SIZE);
        let file_settings = settings.effective_file_settings();

        debug!(batch_size, groups = settings.drive_settings.len(), "fetching drives");
        let drives = self.directory.list_drives().await?;
        debug!(drives_count = drives.len(), "finished fetching drives");

        let mut planned = Vec::with_capacity(drives.len().div_ceil(batch_size));
        for (ordinal, chunk) in drives.chunks(batch_size).enumerate() {
            let key = batch_key(integration_id, session_id, ordinal);
            let payload = serde_json::to_vec(chunk).map_err(|source| SyncError::SerializationFailed {
                key: key.clone(),
                source,
            })?;
            self.store.put(&key, &payload, BATCH_TTL).await?;
            debug!(batch_key = %key, drives = chunk.len(), "batch written");
            planned.push(PlannedBatch {
                key,
                drive_count: chunk.len(),
                file_settings: file_settings.clone(),
            });
        }
        info!(batch_count = planned.len(), "batches created");
        Ok(planned)
    }
}
