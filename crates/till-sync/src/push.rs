//! # Push Pipeline
//!
//! Sends the head of the outbox and applies the server's per-event verdict.
//!
//! ## Push Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          push_now()                                     │
//! │                                                                         │
//! │  sync disabled? ── yes ──► Skipped(SyncDisabled)                       │
//! │  lane busy?     ── yes ──► Skipped(InFlight)                           │
//! │  outbox empty?  ── yes ──► Skipped(NothingToSend)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  POST /sync/push { device_id, events[..50], validate_only: false }     │
//! │       │                                                                 │
//! │       ├── Ok ──► outbox -= (acknowledged ∪ rejected) ∩ batch           │
//! │       │          ledger  = new entries for rejected ++ ledger          │
//! │       │          cursor  = merge(cursor, server_cursor) if numeric     │
//! │       │          last_push_success_at = now                            │
//! │       │                                                                 │
//! │       └── Err ─► ledger = entry per attempted event ++ ledger          │
//! │                  outbox unchanged                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On a failed call the server may or may not have applied the batch, so
//! the events stay queued and also show up in the ledger. The next push
//! resends them with the same ids.

use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, error, info, warn};

use till_core::{Event, FailureEntry, FailureReason};

use crate::engine::Shared;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{PushRequest, PushResponse};

/// Why a push or pull call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Runtime context is incomplete.
    SyncDisabled,
    /// Another run in this lane hasn't finished.
    InFlight,
    /// The outbox is empty.
    NothingToSend,
}

/// Result of one `push_now` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Skipped(SkipReason),
    Completed {
        acknowledged: usize,
        rejected: usize,
        server_cursor: Option<i64>,
    },
    /// The call failed; every attempted event was copied to the ledger.
    Failed { attempted: usize, error: String },
}

impl Shared {
    pub(crate) async fn push_now(&self) -> PushOutcome {
        let device_id = match self.bound_device_id().await {
            Ok(id) => id,
            Err(_) => {
                debug!(lane = self.push_lane.name(), "Push skipped: sync disabled");
                return PushOutcome::Skipped(SkipReason::SyncDisabled);
            }
        };

        let Some(_flight) = self.push_lane.try_enter() else {
            debug!(lane = self.push_lane.name(), "Push skipped: already in flight");
            return PushOutcome::Skipped(SkipReason::InFlight);
        };

        let batch = self
            .state
            .read()
            .await
            .outbox
            .take_batch(self.settings.push_batch_size);
        if batch.is_empty() {
            return PushOutcome::Skipped(SkipReason::NothingToSend);
        }

        let attempted = batch.len();
        debug!(count = attempted, "Pushing outbox batch");

        let request = PushRequest {
            device_id,
            events: batch,
            validate_only: false,
        };

        let result = match self.transport.push(&request).await {
            Ok(response) => self.apply_push_response(&request.events, response).await,
            Err(err) => self.record_push_failure(&request.events, err).await,
        };

        let outcome = result.unwrap_or_else(|e| {
            error!(error = %e, category = e.category(), "Failed to persist push result");
            self.emitter.emit_error(&e.to_string(), false);
            PushOutcome::Failed {
                attempted,
                error: e.to_string(),
            }
        });

        self.emit().await;
        outcome
    }

    async fn apply_push_response(
        &self,
        batch: &[Event],
        response: PushResponse,
    ) -> SyncResult<PushOutcome> {
        let now = Utc::now();

        let failures: Vec<FailureEntry> = response
            .rejected
            .iter()
            .filter_map(|rejection| {
                let event = batch.iter().find(|e| e.event_id == rejection.event_id)?;
                let reason = FailureReason::rejected(
                    rejection.reason_text(),
                    rejection.reject_code(),
                    rejection.details.clone(),
                    now,
                );
                Some(FailureEntry::new(event, reason, now))
            })
            .collect();
        let rejected = failures.len();

        let attempted: HashSet<&str> = batch.iter().map(|e| e.event_id.as_str()).collect();
        let completed: HashSet<&str> = response
            .completed_ids()
            .filter(|id| {
                let known = attempted.contains(id);
                if !known {
                    warn!(event_id = %id, "Server settled an event that was not in the batch");
                }
                known
            })
            .collect();
        let acknowledged = response
            .acknowledged
            .iter()
            .filter(|id| attempted.contains(id.as_str()))
            .count();

        let mut state = self.state.write().await;

        let mut outbox = state.outbox.clone();
        let removed = outbox.remove_ids(&completed);
        let mut ledger = state.ledger.clone();
        ledger.prepend_all(failures);
        let cursor = match response.server_cursor {
            Some(received) => self.settings.cursor_policy.merge(state.server_cursor, received),
            None => state.server_cursor,
        };

        if removed > 0 {
            self.store.save_outbox(outbox.events()).await?;
        }
        if rejected > 0 {
            self.store.save_failed_events(ledger.entries()).await?;
        }
        if response.server_cursor.is_some() {
            self.store.save_server_cursor(cursor).await?;
        }
        self.store.save_last_push_success_at(now).await?;

        state.outbox = outbox;
        state.ledger = ledger;
        state.server_cursor = cursor;
        state.last_push_success_at = Some(now);

        info!(
            acknowledged,
            rejected,
            remaining = state.outbox.len(),
            cursor = state.server_cursor,
            "Push completed"
        );

        Ok(PushOutcome::Completed {
            acknowledged,
            rejected,
            server_cursor: response.server_cursor,
        })
    }

    async fn record_push_failure(&self, batch: &[Event], err: SyncError) -> SyncResult<PushOutcome> {
        let now = Utc::now();
        let reason = err.to_failure_reason();

        error!(
            error = %err,
            category = err.category(),
            reason_code = %reason.code,
            attempted = batch.len(),
            "Sync push failed"
        );
        self.emitter.emit_error(&err.to_string(), err.is_retryable());

        let failures = batch
            .iter()
            .map(|event| FailureEntry::new(event, reason.clone(), now))
            .collect();

        let mut state = self.state.write().await;
        let mut ledger = state.ledger.clone();
        ledger.prepend_all(failures);
        self.store.save_failed_events(ledger.entries()).await?;
        state.ledger = ledger;

        Ok(PushOutcome::Failed {
            attempted: batch.len(),
            error: err.to_string(),
        })
    }
}
