//! # Engine State
//!
//! In-memory mirror of the persisted keys, plus the read-only snapshot
//! handed to the UI.
//!
//! Every mutation happens under the engine's write lock and is followed
//! by the matching durable write before the lock is released.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use till_core::{Event, FailureEntry};

use crate::ledger::FailureLedger;
use crate::outbox::Outbox;
use crate::persist::PersistedState;

#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub outbox: Outbox,
    pub ledger: FailureLedger,
    pub server_cursor: i64,
    pub last_push_success_at: Option<DateTime<Utc>>,
    pub last_pull_success_at: Option<DateTime<Utc>>,
}

impl From<PersistedState> for SyncState {
    fn from(persisted: PersistedState) -> Self {
        SyncState {
            outbox: Outbox::from_events(persisted.outbox),
            ledger: FailureLedger::from_entries(persisted.failed_events),
            server_cursor: persisted.server_cursor,
            last_push_success_at: persisted.last_push_success_at,
            last_pull_success_at: persisted.last_pull_success_at,
        }
    }
}

impl SyncState {
    pub fn snapshot(&self, can_sync: bool) -> SyncSnapshot {
        SyncSnapshot {
            outbox: self.outbox.events().to_vec(),
            server_cursor: self.server_cursor,
            last_push_success_at: self.last_push_success_at,
            last_pull_success_at: self.last_pull_success_at,
            failed_events: self.ledger.entries().to_vec(),
            can_sync,
            pending_count: self.outbox.len(),
        }
    }
}

/// Observable sync state for the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub outbox: Vec<Event>,
    #[ts(type = "number")]
    pub server_cursor: i64,
    #[ts(as = "Option<String>")]
    pub last_push_success_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub last_pull_success_at: Option<DateTime<Utc>>,
    pub failed_events: Vec<FailureEntry>,
    pub can_sync: bool,
    #[ts(type = "number")]
    pub pending_count: usize,
}
