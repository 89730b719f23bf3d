use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dms_sync::config;
use dms_sync::model::SyncSettings;
use dms_sync::session::{new_session_id, SyncController};
use dms_sync::store::{BatchStore, SqliteBatchStore};

#[derive(Debug, Parser)]
#[command(author, version, about = "Plan, inspect and release drive sync batches")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Enumerate drives and persist them in batches; prints the planned batches as JSON
    Sync {
        #[arg(long)]
        integration_id: String,

        /// Defaults to a freshly generated session id
        #[arg(long)]
        session_id: Option<String>,

        /// JSON file with the sync settings (driveSettings, batchSize)
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Delete the given batches
    Release {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the drives stored in a batch
    Show { key: String },
    /// Drop batches whose TTL has elapsed
    PurgeExpired,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| cfg.store.database_url.clone());
    let sqlite = Arc::new(SqliteBatchStore::connect(&database_url).await?);
    let store: Arc<dyn BatchStore> = sqlite.clone();
    let controller = cfg.sync_controller(store);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_signal.cancel();
        }
    });

    execute(args.command, &controller, &sqlite, &cancel).await
}

/// Run `command`, then close the pool whether or not it succeeded.
async fn execute(
    command: Command,
    controller: &SyncController,
    sqlite: &SqliteBatchStore,
    cancel: &CancellationToken,
) -> Result<()> {
    let result = run(command, controller, sqlite, cancel).await;
    sqlite.close().await;
    result
}

async fn run(
    command: Command,
    controller: &SyncController,
    sqlite: &SqliteBatchStore,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Sync {
            integration_id,
            session_id,
            settings,
        } => {
            let settings: SyncSettings = match settings {
                Some(path) => {
                    let raw = tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str(&raw).context("invalid sync settings JSON")?
                }
                None => SyncSettings::default(),
            };
            let session_id = session_id.unwrap_or_else(|| new_session_id(&integration_id));
            info!(%integration_id, %session_id, "starting sync");
            let planned = controller
                .plan_batches(cancel, &integration_id, &session_id, &settings)
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "sessionId": session_id,
                    "batches": planned,
                }))?
            );
        }
        Command::Release { keys } => {
            controller.release_batches(cancel, &keys).await?;
        }
        Command::Show { key } => {
            let drives = controller.load_batch(cancel, &key).await?;
            println!("{}", serde_json::to_string_pretty(&drives)?);
        }
        Command::PurgeExpired => {
            let purged = sqlite.purge_expired().await?;
            info!(purged, "expired batches purged");
        }
    }

    Ok(())
}
