//! Expiring key-value storage for rate-limit windows
//!
//! Two backends share the [`WindowStore`] interface: a process-local map
//! and the `rate_limit_windows` table of the service database.

use std::collections::HashMap;

use async_trait::async_trait;
use catalog_common::db::{QueryExecutor, SqlValue};
use catalog_common::{Error, Result};
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use super::types::{WindowKind, WindowRecord};

/// Window record storage
///
/// Writes replace the whole record, so a reader never sees a
/// half-written timestamp list.
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record under `key`; an expired record is deleted and reported absent
    async fn get(&self, key: &str, now: i64) -> Result<Option<WindowRecord>>;

    async fn set(&self, key: &str, record: &WindowRecord) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete every record expired at `now`; returns how many were removed
    async fn sweep(&self, now: i64) -> Result<u64>;
}

/// In-memory backend; counters reset when the process restarts
#[derive(Default)]
pub struct MemoryWindowStore {
    entries: RwLock<HashMap<String, WindowRecord>>,
}

impl MemoryWindowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl WindowStore for MemoryWindowStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<WindowRecord>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|r| r.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, record: &WindowRecord) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn sweep(&self, now: i64) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| !record.is_expired(now));
        Ok((before - entries.len()) as u64)
    }
}

const TABLE: &str = "rate_limit_windows";

/// SQLite backend; survives restarts
pub struct SqliteWindowStore {
    pool: SqlitePool,
}

impl SqliteWindowStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WindowStore for SqliteWindowStore {
    async fn get(&self, key: &str, now: i64) -> Result<Option<WindowRecord>> {
        let mut exec = QueryExecutor::acquire(&self.pool).await?;
        let rows = exec
            .select(
                TABLE,
                &["fingerprint", "window_kind", "timestamps", "expires_at"],
                &[("key", SqlValue::from(key))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let expires_at = row.get("expires_at").and_then(|v| v.as_i64()).unwrap_or(0);
        if expires_at < now {
            exec.delete(TABLE, &[("key", SqlValue::from(key))]).await?;
            return Ok(None);
        }

        let kind = match row.get("window_kind").and_then(|v| v.as_str()) {
            Some("hourly") => WindowKind::Hourly,
            Some("burst") => WindowKind::Burst,
            other => {
                return Err(Error::Internal(format!(
                    "Unknown window kind {:?} stored for {}",
                    other, key
                )))
            }
        };

        let timestamps: Vec<i64> = row
            .get("timestamps")
            .and_then(|v| v.as_str())
            .map(serde_json::from_str::<Vec<i64>>)
            .transpose()
            .map_err(|e| Error::Internal(format!("Corrupt timestamps for {}: {}", key, e)))?
            .unwrap_or_default();

        Ok(Some(WindowRecord {
            fingerprint: row
                .get("fingerprint")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            kind,
            timestamps,
            expires_at,
        }))
    }

    async fn set(&self, key: &str, record: &WindowRecord) -> Result<()> {
        let timestamps = serde_json::to_string(&record.timestamps)
            .map_err(|e| Error::Internal(format!("Failed to encode timestamps: {}", e)))?;

        let mut exec = QueryExecutor::acquire(&self.pool).await?;
        exec.query(
            "INSERT INTO rate_limit_windows (key, fingerprint, window_kind, timestamps, expires_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET timestamps = excluded.timestamps, \
             expires_at = excluded.expires_at",
        )?
        .execute(&[
            SqlValue::from(key),
            SqlValue::from(record.fingerprint.as_str()),
            SqlValue::from(record.kind.as_str()),
            SqlValue::from(timestamps),
            SqlValue::Integer(record.expires_at),
        ])
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut exec = QueryExecutor::acquire(&self.pool).await?;
        exec.delete(TABLE, &[("key", SqlValue::from(key))]).await?;
        Ok(())
    }

    async fn sweep(&self, now: i64) -> Result<u64> {
        let mut exec = QueryExecutor::acquire(&self.pool).await?;
        exec.query("DELETE FROM rate_limit_windows WHERE expires_at < ?")?
            .execute(&[SqlValue::Integer(now)])
            .await?;
        Ok(exec.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: i64) -> WindowRecord {
        WindowRecord {
            fingerprint: "fp".to_string(),
            kind: WindowKind::Burst,
            timestamps: vec![100, 110],
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_memory_get_set_delete() {
        let store = MemoryWindowStore::new();
        assert!(store.get("k", 0).await.unwrap().is_none());

        store.set("k", &record(500)).await.unwrap();
        assert_eq!(store.get("k", 200).await.unwrap(), Some(record(500)));

        store.delete("k").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_memory_lazy_expiry_removes_record() {
        let store = MemoryWindowStore::new();
        store.set("k", &record(500)).await.unwrap();

        // Still readable at exactly the expiry second
        assert!(store.get("k", 500).await.unwrap().is_some());
        assert!(store.get("k", 501).await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_memory_sweep() {
        let store = MemoryWindowStore::new();
        store.set("old", &record(100)).await.unwrap();
        store.set("new", &record(900)).await.unwrap();

        assert_eq!(store.sweep(500).await.unwrap(), 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("new", 500).await.unwrap().is_some());
    }
}
