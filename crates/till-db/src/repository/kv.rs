//! # Key-Value Repository
//!
//! The `local_kv` table holds every piece of durable sync state as one
//! JSON document per logical key.
//!
//! ```text
//! ┌──────────────────────────────┬────────────────────────────┬──────────────────────┐
//! │ key                          │ value (JSON text)          │ updated_at           │
//! ├──────────────────────────────┼────────────────────────────┼──────────────────────┤
//! │ sync_outbox_events           │ [ {event_id, ...}, ... ]   │ 2026-10-14T09:00:00Z │
//! │ sync_failed_events           │ [ {id, eventId, ...}, ...] │ 2026-10-14T09:00:02Z │
//! │ sync_server_cursor           │ 42                         │ 2026-10-14T09:00:04Z │
//! │ active_device_id             │ "device-1"                 │ 2026-10-14T08:59:58Z │
//! └──────────────────────────────┴────────────────────────────┴──────────────────────┘
//! ```
//!
//! Writes are upserts, so the table never holds two rows for a key.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::store::LocalStore;

/// Repository over the `local_kv` table.
#[derive(Debug, Clone)]
pub struct KvRepository {
    pool: SqlitePool,
}

impl KvRepository {
    pub fn new(pool: SqlitePool) -> Self {
        KvRepository { pool }
    }

    /// Fetches a value by key.
    pub async fn get_value(&self, key: &str) -> DbResult<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM local_kv WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Inserts or replaces a value.
    pub async fn put_value(&self, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO local_kv (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(key = %key, bytes = value.len(), "Stored value");
        Ok(())
    }

    /// Deletes a key. Returns whether a row was removed.
    pub async fn delete_value(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM local_kv WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists stored keys in lexical order.
    pub async fn keys(&self) -> DbResult<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM local_kv ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }
}

#[async_trait]
impl LocalStore for KvRepository {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.put_value(key, value).await
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.delete_value(key).await.map(|_| ())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn setup_repo() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("kv.db")))
            .await
            .unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn test_upsert_replaces_value() {
        let (_dir, db) = setup_repo().await;
        let repo = db.store();

        repo.put_value("sync_server_cursor", "5").await.unwrap();
        repo.put_value("sync_server_cursor", "12").await.unwrap();

        assert_eq!(
            repo.get_value("sync_server_cursor").await.unwrap().as_deref(),
            Some("12")
        );
        assert_eq!(repo.keys().await.unwrap(), vec!["sync_server_cursor"]);
    }

    #[tokio::test]
    async fn test_delete_reports_rows() {
        let (_dir, db) = setup_repo().await;
        let repo = db.store();

        repo.put_value("active_device_id", "\"device-1\"").await.unwrap();
        assert!(repo.delete_value("active_device_id").await.unwrap());
        assert!(!repo.delete_value("active_device_id").await.unwrap());
        assert!(repo.get_value("active_device_id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");

        {
            let db = Database::new(DbConfig::new(&path)).await.unwrap();
            let store: &dyn LocalStore = &db.store();
            store.set("sync_outbox_events", "[]").await.unwrap();
            db.close().await;
        }

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let store = db.store();
        assert_eq!(
            LocalStore::get(&store, "sync_outbox_events")
                .await
                .unwrap()
                .as_deref(),
            Some("[]")
        );
    }
}
