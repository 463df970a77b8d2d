//! # Failure Remediation
//!
//! Operator actions on failure ledger entries, each reported to the
//! server's conflict audit sink.
//!
//! ## Actions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  retry_failed_event(id, validate_only)                                 │
//! │     single-event push with the ORIGINAL event_id                       │
//! │       ├── acknowledged ──────► drop entry (+ outbox copy)              │
//! │       ├── ack, validate_only ► keep entry, stamp response time         │
//! │       ├── rejected ──────────► update in place, retries + 1            │
//! │       └── call failed ───────► update in place, retries + 1, Err       │
//! │                                                                         │
//! │  clone_and_edit_failed_event(id, patch)                                │
//! │     new event_id, payload = snapshot ⊕ patch ──► outbox tail           │
//! │     original entry untouched                                           │
//! │                                                                         │
//! │  discard_failed_event(id, reason) ──► drop entry                       │
//! │                                                                         │
//! │  bulk_retry_failed_events(ids) ──► retry each id, one after another    │
//! │                                                                         │
//! │  export_failure_log() ──► read-only copy of the ledger                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The audit post happens after the local change is persisted. A failed
//! audit post is logged and otherwise ignored.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use till_core::validation::normalize_discard_reason;
use till_core::{merge_payload, payload_from_value, Event, FailureEntry, FailureReason, RejectCode};

use crate::engine::Shared;
use crate::error::{SyncError, SyncResult};
use crate::ledger::FailureExport;
use crate::protocol::{ConflictAction, ConflictActionRequest, PushRequest, PushResponse};

/// Result of a manual retry that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    /// Accepted; the entry is gone.
    Acknowledged,
    /// Accepted by a validate-only dry run; the entry stays.
    Validated,
    /// Rejected again; the entry was updated in place.
    Rejected { reason: String, code: RejectCode },
    /// The response named the event in neither list.
    Unresolved,
}

impl RetryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryOutcome::Acknowledged => "acknowledged",
            RetryOutcome::Validated => "validated",
            RetryOutcome::Rejected { .. } => "rejected",
            RetryOutcome::Unresolved => "unresolved",
        }
    }
}

/// Per-id result of a bulk retry.
#[derive(Debug)]
pub struct BulkRetryItem {
    pub failure_id: String,
    pub result: SyncResult<RetryOutcome>,
}

impl Shared {
    // =========================================================================
    // Retry
    // =========================================================================

    pub(crate) async fn retry_failed_event(
        &self,
        failure_id: &str,
        validate_only: bool,
    ) -> SyncResult<RetryOutcome> {
        let device_id = self.bound_device_id().await?;
        let event = self.failure_event(failure_id).await?;

        let request = PushRequest {
            device_id,
            events: vec![event],
            validate_only,
        };
        let response = self.transport.push(&request).await;

        let (entry, settled) = self.settle_retry(failure_id, validate_only, response).await?;

        match &settled {
            Ok(outcome) => info!(
                failure_id = %failure_id,
                event_id = %entry.event_id,
                validate_only,
                outcome = outcome.as_str(),
                retries = entry.retries_count,
                "Failed event retried"
            ),
            Err(e) => warn!(
                failure_id = %failure_id,
                event_id = %entry.event_id,
                error = %e,
                retries = entry.retries_count,
                "Retry call failed"
            ),
        }

        self.emit().await;

        let outcome_label = match &settled {
            Ok(outcome) => outcome.as_str(),
            Err(_) => "transport_failed",
        };
        let details = json!({
            "failure_id": failure_id,
            "validate_only": validate_only,
            "retries_count": entry.retries_count,
            "outcome": outcome_label,
        });
        self.audit(ConflictAction::RetryExact, &entry, entry.reason.clone(), details)
            .await;

        settled
    }

    /// Applies the retry result to the ledger entry and persists it.
    ///
    /// The outer `Result` is a storage failure; the inner one is the
    /// outcome handed back to the caller.
    async fn settle_retry(
        &self,
        failure_id: &str,
        validate_only: bool,
        response: SyncResult<PushResponse>,
    ) -> SyncResult<(FailureEntry, SyncResult<RetryOutcome>)> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let mut ledger = state.ledger.clone();
        let entry = ledger
            .get_mut(failure_id)
            .ok_or_else(|| not_found(failure_id))?;

        let (settled, received_cursor) = match response {
            Err(err) => {
                entry.record_retry_failure(err.to_failure_reason(), now);
                (Err(err), None)
            }
            Ok(response) => {
                let outcome = settle_entry(entry, &response, validate_only, now);
                let cursor = if validate_only { None } else { response.server_cursor };
                (Ok(outcome), cursor)
            }
        };
        let entry = entry.clone();

        let mut outbox = None;
        if matches!(settled, Ok(RetryOutcome::Acknowledged)) {
            ledger.remove(failure_id);
            let mut next = state.outbox.clone();
            if next.remove(&entry.event_id) {
                outbox = Some(next);
            }
        }
        let cursor = received_cursor
            .map(|received| self.settings.cursor_policy.merge(state.server_cursor, received));

        self.store.save_failed_events(ledger.entries()).await?;
        if let Some(next) = &outbox {
            self.store.save_outbox(next.events()).await?;
        }
        if let Some(cursor) = cursor {
            self.store.save_server_cursor(cursor).await?;
        }

        state.ledger = ledger;
        if let Some(next) = outbox {
            state.outbox = next;
        }
        if let Some(cursor) = cursor {
            state.server_cursor = cursor;
        }

        Ok((entry, settled))
    }

    pub(crate) async fn bulk_retry_failed_events(&self, failure_ids: &[String]) -> Vec<BulkRetryItem> {
        let mut items = Vec::with_capacity(failure_ids.len());
        for failure_id in failure_ids {
            let result = self.retry_failed_event(failure_id, false).await;
            items.push(BulkRetryItem {
                failure_id: failure_id.clone(),
                result,
            });
        }

        let failed = items.iter().filter(|i| i.result.is_err()).count();
        info!(count = items.len(), failed, "Bulk retry finished");
        items
    }

    // =========================================================================
    // Clone and Edit
    // =========================================================================

    pub(crate) async fn clone_and_edit_failed_event(
        &self,
        failure_id: &str,
        patch: Value,
    ) -> SyncResult<Event> {
        let patch_map = payload_from_value(patch.clone())
            .map_err(|e| SyncError::InvalidPatch(e.to_string()))?;

        let (entry, event) = {
            let mut state = self.state.write().await;
            let entry = state
                .ledger
                .get(failure_id)
                .cloned()
                .ok_or_else(|| not_found(failure_id))?;

            let event = Event::new(
                entry.event_type.clone(),
                merge_payload(&entry.payload_snapshot, &patch_map),
                Utc::now(),
            );

            let mut next = state.outbox.clone();
            next.push_back(event.clone());
            self.store.save_outbox(next.events()).await?;
            state.outbox = next;

            (entry, event)
        };

        info!(
            failure_id = %failure_id,
            original_event_id = %entry.event_id,
            new_event_id = %event.event_id,
            "Failed event cloned with edits"
        );
        self.emit().await;

        let details = json!({
            "failure_id": failure_id,
            "new_event_id": event.event_id,
            "patch": patch,
        });
        self.audit(ConflictAction::CloneEdit, &entry, entry.reason.clone(), details)
            .await;

        Ok(event)
    }

    // =========================================================================
    // Discard
    // =========================================================================

    pub(crate) async fn discard_failed_event(
        &self,
        failure_id: &str,
        reason: &str,
    ) -> SyncResult<FailureEntry> {
        let reason = normalize_discard_reason(reason);

        let entry = {
            let mut state = self.state.write().await;
            let mut next = state.ledger.clone();
            let entry = next.remove(failure_id).ok_or_else(|| not_found(failure_id))?;
            self.store.save_failed_events(next.entries()).await?;
            state.ledger = next;
            entry
        };

        info!(
            failure_id = %failure_id,
            event_id = %entry.event_id,
            reason = %reason,
            "Failed event discarded"
        );
        self.emit().await;

        let details = json!({
            "failure_id": failure_id,
            "reason_code": entry.reason_code,
            "retries_count": entry.retries_count,
        });
        self.audit(ConflictAction::Discard, &entry, reason, details).await;

        Ok(entry)
    }

    // =========================================================================
    // Export
    // =========================================================================

    pub(crate) async fn export_failure_log(&self) -> SyncResult<FailureExport> {
        let device_id = self.known_device_id().await?;
        let export = self.state.read().await.ledger.export(device_id, Utc::now());
        info!(count = export.count, "Failure log exported");
        Ok(export)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn failure_event(&self, failure_id: &str) -> SyncResult<Event> {
        self.state
            .read()
            .await
            .ledger
            .get(failure_id)
            .map(FailureEntry::to_event)
            .ok_or_else(|| not_found(failure_id))
    }

    /// Context device id, falling back to the persisted bound device.
    async fn known_device_id(&self) -> SyncResult<Option<String>> {
        if let Some(id) = self.context.read().await.device_id() {
            return Ok(Some(id.to_string()));
        }
        self.store.device_id().await
    }

    /// Posts an audit record. Never fails the caller.
    async fn audit(&self, action: ConflictAction, entry: &FailureEntry, reason: String, details: Value) {
        let device_id = match self.known_device_id().await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!(action = %action, event_id = %entry.event_id, "No device id, audit record skipped");
                return;
            }
            Err(e) => {
                warn!(action = %action, error = %e, "Could not read device id, audit record skipped");
                return;
            }
        };

        let request = ConflictActionRequest {
            device_id,
            action,
            event_id: entry.event_id.clone(),
            event_type: entry.event_type.clone(),
            reason,
            payload_snapshot: entry.payload_snapshot.clone(),
            details,
        };

        if let Err(e) = self.transport.conflict_action(&request).await {
            warn!(
                action = %action,
                event_id = %entry.event_id,
                error = %e,
                "Conflict audit post failed"
            );
        }
    }
}

/// Applies a retry response to the entry in place.
fn settle_entry(
    entry: &mut FailureEntry,
    response: &PushResponse,
    validate_only: bool,
    now: DateTime<Utc>,
) -> RetryOutcome {
    if let Some(rejection) = response.rejection_for(&entry.event_id) {
        let reason = rejection.reason_text();
        let code = rejection.reject_code();
        let failure =
            FailureReason::rejected(reason.clone(), code.clone(), rejection.details.clone(), now);
        entry.record_retry_failure(failure, now);
        return RetryOutcome::Rejected { reason, code };
    }

    entry.last_server_response_at = Some(now);
    match (response.is_acknowledged(&entry.event_id), validate_only) {
        (true, false) => RetryOutcome::Acknowledged,
        (true, true) => RetryOutcome::Validated,
        (false, _) => RetryOutcome::Unresolved,
    }
}

fn not_found(failure_id: &str) -> SyncError {
    SyncError::FailureNotFound {
        id: failure_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::keys;
    use crate::protocol::RejectedEvent;
    use crate::test_support::{payload, Harness};
    use pretty_assertions::assert_eq;
    use till_core::validation::{DEFAULT_DISCARD_REASON, MAX_REASON_LEN};
    use till_db::LocalStore;

    fn rejection(event_id: &str, reason: &str) -> PushResponse {
        PushResponse {
            rejected: vec![RejectedEvent {
                event_id: event_id.to_string(),
                reason: Some(reason.to_string()),
                code: Some("validation_failed".into()),
                details: json!({"field": reason}),
            }],
            ..Default::default()
        }
    }

    fn ack(event_id: &str) -> PushResponse {
        PushResponse {
            acknowledged: vec![event_id.to_string()],
            ..Default::default()
        }
    }

    /// Queues one event and gets it rejected, returning the ledger entry.
    async fn rejected_entry(harness: &Harness, body: Value) -> FailureEntry {
        let event = harness
            .engine
            .enqueue_event("customer.upsert", payload(body))
            .await
            .unwrap();
        harness
            .transport
            .script_push(Ok(rejection(&event.event_id, "name taken")));
        harness.engine.push_now().await;
        harness.engine.snapshot().await.failed_events[0].clone()
    }

    #[tokio::test]
    async fn test_repeated_rejection_keeps_identity() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        for _ in 0..2 {
            harness
                .transport
                .script_push(Ok(rejection(&entry.event_id, "still taken")));
            harness.engine.retry_failed_event(&entry.id, false).await.unwrap();
        }
        let before = harness.engine.snapshot().await.failed_events[0].clone();
        assert_eq!(before.retries_count, 2);

        harness
            .transport
            .script_push(Ok(rejection(&entry.event_id, "taken again")));
        let outcome = harness.engine.retry_failed_event(&entry.id, false).await.unwrap();
        assert!(matches!(outcome, RetryOutcome::Rejected { ref reason, .. } if reason == "taken again"));

        let failed = harness.engine.snapshot().await.failed_events;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, entry.id);
        assert_eq!(failed[0].retries_count, 3);
        assert_eq!(failed[0].reason, "taken again");

        let sent = harness.transport.push_requests();
        let last = sent.last().unwrap();
        assert_eq!(last.events.len(), 1);
        assert_eq!(last.events[0].event_id, entry.event_id);
        assert_eq!(last.events[0].payload, entry.payload_snapshot);
    }

    #[tokio::test]
    async fn test_acknowledged_retry_removes_entry_and_queued_copy() {
        let harness = Harness::with_context().await;
        let event = harness
            .engine
            .enqueue_event("customer.upsert", payload(json!({"name": "Bob"})))
            .await
            .unwrap();
        harness
            .transport
            .script_push(Err(SyncError::Transport("offline".into())));
        harness.engine.push_now().await;

        let entry = harness.engine.snapshot().await.failed_events[0].clone();
        assert_eq!(harness.engine.pending_count().await, 1);

        harness.transport.script_push(Ok(PushResponse {
            server_cursor: Some(40),
            ..ack(&event.event_id)
        }));
        let outcome = harness.engine.retry_failed_event(&entry.id, false).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Acknowledged);

        let snapshot = harness.engine.snapshot().await;
        assert!(snapshot.failed_events.is_empty());
        assert!(snapshot.outbox.is_empty());
        assert_eq!(snapshot.server_cursor, 40);

        let stored = harness.backing.get(keys::FAILED_EVENTS).await.unwrap().unwrap();
        assert_eq!(stored, "[]");
    }

    #[tokio::test]
    async fn test_validate_only_keeps_entry() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        harness.transport.script_push(Ok(PushResponse {
            server_cursor: Some(7),
            validate_only: Some(true),
            ..ack(&entry.event_id)
        }));
        let outcome = harness.engine.retry_failed_event(&entry.id, true).await.unwrap();
        assert_eq!(outcome, RetryOutcome::Validated);

        assert!(harness.transport.push_requests().last().unwrap().validate_only);
        let snapshot = harness.engine.snapshot().await;
        assert_eq!(snapshot.failed_events.len(), 1);
        assert_eq!(snapshot.failed_events[0].retries_count, 0);
        assert_eq!(snapshot.server_cursor, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_on_retry_counts_and_errors() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        harness
            .transport
            .script_push(Err(SyncError::Timeout("15s".into())));
        let err = harness
            .engine
            .retry_failed_event(&entry.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)));

        let failed = harness.engine.snapshot().await.failed_events;
        assert_eq!(failed[0].id, entry.id);
        assert_eq!(failed[0].retries_count, 1);
        assert_eq!(failed[0].code(), RejectCode::DomainRuleViolation);

        let audits = harness.transport.audits();
        assert_eq!(audits.last().unwrap().details["outcome"], json!("transport_failed"));
    }

    #[tokio::test]
    async fn test_retry_requires_context_and_known_id() {
        let harness = Harness::new().await;
        let err = harness.engine.retry_failed_event("nope", false).await.unwrap_err();
        assert!(matches!(err, SyncError::MissingRuntimeContext { .. }));

        let harness = Harness::with_context().await;
        let err = harness.engine.retry_failed_event("nope", false).await.unwrap_err();
        assert!(matches!(err, SyncError::FailureNotFound { .. }));
        assert_eq!(harness.transport.push_count(), 0);
    }

    #[tokio::test]
    async fn test_clone_and_edit_queues_new_event() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob", "phone": "555"})).await;

        let event = harness
            .engine
            .clone_and_edit_failed_event(&entry.id, json!({"name": "Bill"}))
            .await
            .unwrap();

        assert_ne!(event.event_id, entry.event_id);
        assert_eq!(event.event_type, "customer.upsert");
        assert_eq!(event.payload["name"], json!("Bill"));
        assert_eq!(event.payload["phone"], json!("555"));

        let snapshot = harness.engine.snapshot().await;
        assert_eq!(snapshot.outbox.last().unwrap().event_id, event.event_id);
        assert_eq!(snapshot.failed_events, vec![entry.clone()]);

        let audit = harness.transport.audits().pop().unwrap();
        assert_eq!(audit.action, ConflictAction::CloneEdit);
        assert_eq!(audit.event_id, entry.event_id);
        assert_eq!(audit.details["new_event_id"], json!(event.event_id));
    }

    #[tokio::test]
    async fn test_clone_and_edit_rejects_non_object_patch() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        let err = harness
            .engine
            .clone_and_edit_failed_event(&entry.id, json!(["name"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidPatch(_)));
        assert!(harness.engine.snapshot().await.outbox.is_empty());
    }

    #[tokio::test]
    async fn test_discard_removes_entry_with_reason() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        let removed = harness
            .engine
            .discard_failed_event(&entry.id, "duplicate customer")
            .await
            .unwrap();
        assert_eq!(removed.id, entry.id);
        assert!(harness.engine.snapshot().await.failed_events.is_empty());

        let audit = harness.transport.audits().pop().unwrap();
        assert_eq!(audit.action, ConflictAction::Discard);
        assert_eq!(audit.reason, "duplicate customer");
        assert_eq!(audit.device_id, "register-1");

        let err = harness
            .engine
            .discard_failed_event(&entry.id, "again")
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::FailureNotFound { .. }));
    }

    #[tokio::test]
    async fn test_discard_accepts_any_reason() {
        let harness = Harness::with_context().await;
        let blank = rejected_entry(&harness, json!({"n": 1})).await;
        let long = rejected_entry(&harness, json!({"n": 2})).await;

        harness.engine.discard_failed_event(&blank.id, "").await.unwrap();
        harness
            .engine
            .discard_failed_event(&long.id, &"x".repeat(MAX_REASON_LEN + 20))
            .await
            .unwrap();
        assert!(harness.engine.snapshot().await.failed_events.is_empty());

        let audits = harness.transport.audits();
        assert_eq!(audits[0].reason, DEFAULT_DISCARD_REASON);
        assert_eq!(audits[1].reason.len(), MAX_REASON_LEN);
    }

    #[tokio::test]
    async fn test_retry_leaves_entry_alone_when_store_fails() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        harness.store.fail_writes(true);
        harness
            .transport
            .script_push(Ok(rejection(&entry.event_id, "still taken")));
        let err = harness
            .engine
            .retry_failed_event(&entry.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(_)));

        let failed = harness.engine.snapshot().await.failed_events;
        assert_eq!(failed, vec![entry]);
    }

    #[tokio::test]
    async fn test_acknowledged_retry_keeps_state_when_store_fails() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;

        harness.store.fail_writes(true);
        harness.transport.script_push(Ok(PushResponse {
            server_cursor: Some(12),
            ..ack(&entry.event_id)
        }));
        let result = harness.engine.retry_failed_event(&entry.id, false).await;
        assert!(matches!(result, Err(SyncError::Storage(_))));

        let snapshot = harness.engine.snapshot().await;
        assert_eq!(snapshot.failed_events.len(), 1);
        assert_eq!(snapshot.server_cursor, 0);
    }

    #[tokio::test]
    async fn test_bulk_retry_is_sequential_and_independent() {
        let harness = Harness::with_context().await;
        let first = rejected_entry(&harness, json!({"n": 1})).await;
        let second = rejected_entry(&harness, json!({"n": 2})).await;

        harness.transport.script_push(Ok(ack(&first.event_id)));
        harness
            .transport
            .script_push(Err(SyncError::Transport("reset".into())));

        let ids = vec![first.id.clone(), "missing".to_string(), second.id.clone()];
        let items = harness.engine.bulk_retry_failed_events(&ids).await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].failure_id, first.id);
        assert!(matches!(items[0].result, Ok(RetryOutcome::Acknowledged)));
        assert!(matches!(items[1].result, Err(SyncError::FailureNotFound { .. })));
        assert!(matches!(items[2].result, Err(SyncError::Transport(_))));

        let sent = harness.transport.push_requests();
        let retried: Vec<&str> = sent[sent.len() - 2..]
            .iter()
            .map(|r| r.events[0].event_id.as_str())
            .collect();
        assert_eq!(retried, vec![first.event_id.as_str(), second.event_id.as_str()]);

        let failed = harness.engine.snapshot().await.failed_events;
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, second.id);
        assert_eq!(failed[0].retries_count, 1);
    }

    #[tokio::test]
    async fn test_export_is_read_only() {
        let harness = Harness::with_context().await;
        rejected_entry(&harness, json!({"name": "Bob"})).await;
        let before = harness.engine.snapshot().await;
        let pushes = harness.transport.push_count();

        let export = harness.engine.export_failure_log().await.unwrap();
        assert_eq!(export.count, 1);
        assert_eq!(export.device_id.as_deref(), Some("register-1"));
        assert_eq!(export.entries, before.failed_events);

        assert_eq!(harness.engine.snapshot().await, before);
        assert_eq!(harness.transport.push_count(), pushes);
        assert!(harness.transport.audits().is_empty());
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_action() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;
        harness.transport.fail_audits();

        let removed = harness
            .engine
            .discard_failed_event(&entry.id, "test data")
            .await;
        assert!(removed.is_ok());
        assert!(harness.engine.snapshot().await.failed_events.is_empty());
    }

    #[tokio::test]
    async fn test_retry_sends_audit_record() {
        let harness = Harness::with_context().await;
        let entry = rejected_entry(&harness, json!({"name": "Bob"})).await;
        harness.transport.script_push(Ok(ack(&entry.event_id)));

        harness.engine.retry_failed_event(&entry.id, false).await.unwrap();

        let audits = harness.transport.audits();
        assert_eq!(audits.len(), 1);
        let audit = &audits[0];
        assert_eq!(audit.action, ConflictAction::RetryExact);
        assert_eq!(audit.event_id, entry.event_id);
        assert_eq!(audit.event_type, "customer.upsert");
        assert_eq!(audit.payload_snapshot, entry.payload_snapshot);
        assert_eq!(audit.details["failure_id"], json!(entry.id));
        assert_eq!(audit.details["outcome"], json!("acknowledged"));
    }
}
