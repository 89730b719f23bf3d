//! Configuration loader and validator for the batch worker.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::directory::{DriveDirectory, RemoteDirectory, SyntheticDirectory, DEFAULT_SYNTHETIC_DRIVES};
use crate::session::SyncController;
use crate::store::BatchStore;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
/// Batch size default and TTL are fixed, so unknown sections are rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub store: Store,
    #[serde(default)]
    pub directory: Directory,
}

/// Durable batch store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub database_url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryKind {
    #[default]
    Synthetic,
    Remote,
}

/// Where drives are enumerated from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Directory {
    #[serde(default)]
    pub kind: DirectoryKind,
    #[serde(default = "default_synthetic_drive_count")]
    pub synthetic_drive_count: usize,
    #[serde(default)]
    pub remote_base_url: Option<String>,
}

fn default_synthetic_drive_count() -> usize {
    DEFAULT_SYNTHETIC_DRIVES
}

impl Default for Directory {
    fn default() -> Self {
        Self {
            kind: DirectoryKind::default(),
            synthetic_drive_count: default_synthetic_drive_count(),
            remote_base_url: None,
        }
    }
}

impl Config {
    /// Wire the sync entry points to `store` and the configured directory.
    pub fn sync_controller(&self, store: Arc<dyn BatchStore>) -> SyncController {
        SyncController::new(store, self.directory.build())
    }
}

impl Directory {
    pub fn build(&self) -> Arc<dyn DriveDirectory> {
        match self.kind {
            DirectoryKind::Synthetic => Arc::new(SyntheticDirectory::new(self.synthetic_drive_count)),
            DirectoryKind::Remote => Arc::new(RemoteDirectory {
                base_url: self.remote_base_url.clone(),
            }),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.store.database_url.trim().is_empty() {
        return Err(ConfigError::Invalid("store.database_url must be non-empty"));
    }
    if cfg.directory.kind == DirectoryKind::Remote
        && cfg
            .directory
            .remote_base_url
            .as_deref()
            .map_or(true, |url| url.trim().is_empty())
    {
        return Err(ConfigError::Invalid(
            "directory.remote_base_url is required for the remote directory",
        ));
    }
    Ok(())
}

/// Example configuration with every option spelled out.
pub fn example() -> &'static str {
    r#"store:
  database_url: "sqlite://./data/batches.db"

directory:
  kind: synthetic
  synthetic_drive_count: 1000
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.directory.kind, DirectoryKind::Synthetic);
    }

    #[test]
    fn sections_default_when_missing() {
        let cfg: Config = serde_yaml::from_str("store:\n  database_url: \"sqlite::memory:\"\n").unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.directory.synthetic_drive_count, 1000);
    }

    #[test]
    fn invalid_database_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.store.database_url = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err { ConfigError::Invalid(msg) => assert!(msg.contains("store.database_url")), _ => panic!("wrong error") }
    }

    #[test]
    fn planner_section_is_rejected() {
        let raw = format!("{}planner:\n  default_batch_size: 40\n", example());
        assert!(serde_yaml::from_str::<Config>(&raw).is_err());
    }

    #[test]
    fn remote_directory_needs_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.directory.kind = DirectoryKind::Remote;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
        cfg.directory.remote_base_url = Some("https://dms.example.com".into());
        validate(&cfg).unwrap();
    }

    #[tokio::test]
    async fn remote_directory_is_not_implemented() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.directory.kind = DirectoryKind::Remote;
        let err = cfg.directory.build().list_drives().await.unwrap_err();
        assert!(matches!(err, crate::error::SyncError::NotImplemented(_)));
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.directory.synthetic_drive_count, 1000);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
