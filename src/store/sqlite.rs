use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::BatchStore;
use crate::error::{BoxError, SyncError};

/// Keys per DELETE statement; keeps well below SQLite's bound-parameter limit.
const DELETE_CHUNK: usize = 500;

#[derive(Debug, Clone)]
pub struct SqliteBatchStore {
    pool: SqlitePool,
}

impl SqliteBatchStore {
    /// Open (or create) the database at `database_url` and apply migrations.
    pub async fn connect(database_url: &str) -> Result<Self, SyncError> {
        let normalized = prepare_sqlite_url(database_url);
        let pool = SqlitePool::connect(&normalized)
            .await
            .map_err(|err| SyncError::StoreNotReady(err.to_string()))?;
        // Enable WAL and stricter durability.
        for pragma in ["PRAGMA journal_mode=WAL;", "PRAGMA synchronous=FULL;"] {
            sqlx::query(pragma)
                .execute(&pool)
                .await
                .map_err(|err| SyncError::StoreNotReady(err.to_string()))?;
        }
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|err| SyncError::StoreNotReady(format!("migrations failed: {err}")))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Remove every entry whose TTL has elapsed. SQLite has no native expiry,
    /// so expired rows linger (invisible to `get`) until this runs.
    #[instrument(skip_all)]
    pub async fn purge_expired(&self) -> Result<u64, SyncError> {
        let now = Utc::now().timestamp_millis();
        let res = sqlx::query("DELETE FROM batches WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|err| SyncError::StoreDeleteFailed(Box::new(err)))?;
        debug!(purged = res.rows_affected(), "purged expired batches");
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl BatchStore for SqliteBatchStore {
    async fn ping(&self) -> Result<(), SyncError> {
        if self.pool.is_closed() {
            return Err(SyncError::StoreNotReady("connection pool is closed".into()));
        }
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|err| SyncError::StoreNotReady(err.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn put(&self, key: &str, payload: &[u8], ttl: Duration) -> Result<(), SyncError> {
        let write_failed = |source: BoxError| SyncError::StoreWriteFailed {
            key: key.to_string(),
            source,
        };
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|err| write_failed(err.into()))?;
        let expires_at = now
            .checked_add_signed(ttl)
            .map(|ts| ts.timestamp_millis())
            .unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO batches (key, payload, expires_at, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, \
             expires_at = excluded.expires_at, created_at = excluded.created_at",
        )
        .bind(key)
        .bind(payload)
        .bind(expires_at)
        .bind(now.timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|err| write_failed(err.into()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SyncError> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT payload FROM batches WHERE key = ? AND expires_at > ?")
            .bind(key)
            .bind(Utc::now().timestamp_millis())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| SyncError::StoreReadFailed {
                key: key.to_string(),
                source: Box::new(err),
            })
    }

    #[instrument(skip_all, fields(keys = keys.len()))]
    async fn delete_all(&self, keys: &[String]) -> Result<u64, SyncError> {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;
        for chunk in keys.chunks(DELETE_CHUNK) {
            // Live rows first, so rows_affected is exactly what was released.
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM batches WHERE expires_at > ");
            qb.push_bind(now);
            qb.push(" AND key IN (");
            push_keys(&mut qb, chunk);
            let res = qb
                .build()
                .execute(&self.pool)
                .await
                .map_err(|err| SyncError::StoreDeleteFailed(Box::new(err)))?;
            removed += res.rows_affected();

            // Then sweep whatever expired copies of these keys remain.
            let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM batches WHERE key IN (");
            push_keys(&mut qb, chunk);
            qb.build()
                .execute(&self.pool)
                .await
                .map_err(|err| SyncError::StoreDeleteFailed(Box::new(err)))?;
        }
        Ok(removed)
    }
}

fn push_keys(qb: &mut QueryBuilder<'_, Sqlite>, keys: &[String]) {
    let mut separated = qb.separated(", ");
    for key in keys {
        separated.push_bind(key.clone());
    }
    separated.push_unseparated(")");
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. In-memory URLs pass through.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(?err, path = %parent.display(), "failed to create database directory");
            }
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{q}&mode=rwc"),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{expanded_path}?{query}")
}
