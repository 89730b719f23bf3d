pub mod config;
pub mod directory;
pub mod error;
pub mod model;
pub mod planner;
pub mod session;
pub mod store;

pub use error::SyncError;
pub use model::{DriveSyncSettings, FileSyncSettings, SyncSettings};
pub use session::SyncController;
