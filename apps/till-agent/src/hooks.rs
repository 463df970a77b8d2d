//! Log-only collaborators for running the engine without a UI.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::{error, info};

use till_sync::{ServerUpdate, SyncEventEmitter, SyncResult, SyncSnapshot, UpdateApplier};

/// Logs pulled updates grouped by entity.
pub struct LogApplier;

#[async_trait]
impl UpdateApplier for LogApplier {
    async fn apply_server_updates(&self, updates: &[ServerUpdate]) -> SyncResult<()> {
        for (entity, count) in count_by_entity(updates) {
            info!(entity = %entity, count, "Server updates received");
        }
        Ok(())
    }
}

/// Logs snapshot changes and swallowed errors.
pub struct LogEmitter;

impl SyncEventEmitter for LogEmitter {
    fn emit_snapshot(&self, snapshot: &SyncSnapshot) {
        info!(
            pending = snapshot.pending_count,
            failed = snapshot.failed_events.len(),
            cursor = snapshot.server_cursor,
            can_sync = snapshot.can_sync,
            "Sync state changed"
        );
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        error!(retryable, "Sync error: {}", message);
    }
}

fn count_by_entity(updates: &[ServerUpdate]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for update in updates {
        *counts.entry(update.entity.as_str()).or_insert(0) += 1;
    }
    counts
}
