//! Drive enumeration collaborators.
use async_trait::async_trait;
use tracing::debug;

use crate::error::SyncError;

/// Number of drives the synthetic directory reports unless told otherwise.
pub const DEFAULT_SYNTHETIC_DRIVES: usize = 1000;

#[async_trait]
pub trait DriveDirectory: Send + Sync {
    /// All drive identifiers, in the order the directory reports them.
    async fn list_drives(&self) -> Result<Vec<String>, SyncError>;
}

/// Stand-in directory producing `drive-0`, `drive-1`, ... in order.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticDirectory {
    count: usize,
}

impl SyntheticDirectory {
    pub fn new(count: usize) -> Self {
        Self { count }
    }
}

impl Default for SyntheticDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_SYNTHETIC_DRIVES)
    }
}

#[async_trait]
impl DriveDirectory for SyntheticDirectory {
    async fn list_drives(&self) -> Result<Vec<String>, SyncError> {
        debug!(count = self.count, "listing synthetic drives");
        Ok((0..self.count).map(|i| format!("drive-{i}")).collect())
    }
}

/// Placeholder for the HTTP-backed document management directory.
#[derive(Debug, Clone, Default)]
pub struct RemoteDirectory {
    pub base_url: Option<String>,
}

#[async_trait]
impl DriveDirectory for RemoteDirectory {
    async fn list_drives(&self) -> Result<Vec<String>, SyncError> {
        Err(SyncError::NotImplemented("remote drive directory"))
    }
}
