//! # Persisted Sync State
//!
//! Typed access to the engine's durable keys on top of a [`LocalStore`].
//!
//! ```text
//! ┌─────────────────────────────┬──────────────────────────────┐
//! │ logical key                 │ value                        │
//! ├─────────────────────────────┼──────────────────────────────┤
//! │ sync_outbox_events          │ Vec<Event>                   │
//! │ sync_failed_events          │ Vec<FailureEntry>            │
//! │ sync_server_cursor          │ i64                          │
//! │ sync_last_push_success_at   │ RFC 3339 timestamp           │
//! │ sync_last_pull_success_at   │ RFC 3339 timestamp           │
//! │ active_device_id            │ String                       │
//! └─────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! A value that no longer decodes is copied to `<key>_quarantine`, logged
//! and read as empty, matching how a fresh device starts. The next save
//! overwrites the original key but the quarantined copy survives.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use till_core::{Event, FailureEntry};
use till_db::LocalStore;

use crate::error::SyncResult;

/// Logical storage keys.
pub mod keys {
    pub const OUTBOX: &str = "sync_outbox_events";
    pub const FAILED_EVENTS: &str = "sync_failed_events";
    pub const SERVER_CURSOR: &str = "sync_server_cursor";
    pub const LAST_PUSH_SUCCESS_AT: &str = "sync_last_push_success_at";
    pub const LAST_PULL_SUCCESS_AT: &str = "sync_last_pull_success_at";
    pub const DEVICE_ID: &str = "active_device_id";

    /// Where an undecodable value under `key` is kept.
    pub fn quarantine(key: &str) -> String {
        format!("{key}_quarantine")
    }
}

/// Everything read back from the store at engine construction.
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub outbox: Vec<Event>,
    pub failed_events: Vec<FailureEntry>,
    pub server_cursor: i64,
    pub last_push_success_at: Option<DateTime<Utc>>,
    pub last_pull_success_at: Option<DateTime<Utc>>,
}

/// Typed wrapper over the injected store.
#[derive(Clone)]
pub struct SyncStore {
    store: Arc<dyn LocalStore>,
}

impl SyncStore {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        SyncStore { store }
    }

    /// Loads every key the engine owns.
    pub async fn load(&self) -> SyncResult<PersistedState> {
        Ok(PersistedState {
            outbox: self.read(keys::OUTBOX).await?.unwrap_or_default(),
            failed_events: self.read(keys::FAILED_EVENTS).await?.unwrap_or_default(),
            server_cursor: self.read(keys::SERVER_CURSOR).await?.unwrap_or(0),
            last_push_success_at: self.read(keys::LAST_PUSH_SUCCESS_AT).await?,
            last_pull_success_at: self.read(keys::LAST_PULL_SUCCESS_AT).await?,
        })
    }

    pub async fn save_outbox(&self, outbox: &[Event]) -> SyncResult<()> {
        self.write(keys::OUTBOX, &outbox).await
    }

    pub async fn save_failed_events(&self, entries: &[FailureEntry]) -> SyncResult<()> {
        self.write(keys::FAILED_EVENTS, &entries).await
    }

    pub async fn save_server_cursor(&self, cursor: i64) -> SyncResult<()> {
        self.write(keys::SERVER_CURSOR, &cursor).await
    }

    pub async fn save_last_push_success_at(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.write(keys::LAST_PUSH_SUCCESS_AT, &at).await
    }

    pub async fn save_last_pull_success_at(&self, at: DateTime<Utc>) -> SyncResult<()> {
        self.write(keys::LAST_PULL_SUCCESS_AT, &at).await
    }

    pub async fn device_id(&self) -> SyncResult<Option<String>> {
        self.read(keys::DEVICE_ID).await
    }

    pub async fn save_device_id(&self, device_id: &str) -> SyncResult<()> {
        self.write(keys::DEVICE_ID, &device_id).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> SyncResult<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                let quarantine = keys::quarantine(key);
                self.store.set(&quarantine, &raw).await?;
                warn!(
                    key = %key,
                    quarantine = %quarantine,
                    error = %e,
                    "Stored value no longer decodes, quarantined"
                );
                Ok(None)
            }
        }
    }

    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SyncResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw).await?;
        Ok(())
    }
}
