//! # Sync Protocol Messages
//!
//! Request and response bodies for the three sync endpoints.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Sync Protocol (HTTP + JSON)                        │
//! │                                                                         │
//! │  PUSH                                                                  │
//! │  ────                                                                  │
//! │  device ───► POST /sync/push { device_id, events, validate_only }      │
//! │  server ◄─── { acknowledged: [id], rejected: [{event_id, reason,       │
//! │                code, details}], server_cursor?, validate_only? }       │
//! │                                                                         │
//! │  PULL (repeated while has_more)                                        │
//! │  ────                                                                  │
//! │  device ───► POST /sync/pull { device_id, cursor, limit }              │
//! │  server ◄─── { updates: [...], server_cursor, has_more }               │
//! │                                                                         │
//! │  AUDIT (fire-and-forget)                                               │
//! │  ─────                                                                 │
//! │  device ───► POST /sync/conflict-action { device_id, action, ... }     │
//! │                                                                         │
//! │  ERROR (any non-2xx)                                                   │
//! │  ─────                                                                 │
//! │  server ◄─── { code, message, errors, status }                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Required response fields are plain struct fields, so a body missing
//! them fails to decode and is reported as a malformed response instead of
//! being read as "nothing happened".

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use till_core::{Event, Payload, RejectCode};

// =============================================================================
// Push
// =============================================================================

/// Body of `POST /sync/push`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushRequest {
    pub device_id: String,
    pub events: Vec<Event>,
    pub validate_only: bool,
}

/// Server decision for a pushed batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PushResponse {
    /// Event ids the server has applied (or already had).
    pub acknowledged: Vec<String>,

    /// Event ids the server refused, with a reason.
    pub rejected: Vec<RejectedEvent>,

    /// Present when the server's change log moved.
    #[serde(default, deserialize_with = "numeric_cursor")]
    pub server_cursor: Option<i64>,

    /// Echo of the request flag. Not used by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_only: Option<bool>,
}

impl PushResponse {
    /// Ids to drop from the outbox: acknowledged ∪ rejected.
    pub fn completed_ids(&self) -> impl Iterator<Item = &str> {
        self.acknowledged
            .iter()
            .map(String::as_str)
            .chain(self.rejected.iter().map(|r| r.event_id.as_str()))
    }

    pub fn is_acknowledged(&self, event_id: &str) -> bool {
        self.acknowledged.iter().any(|id| id == event_id)
    }

    pub fn rejection_for(&self, event_id: &str) -> Option<&RejectedEvent> {
        self.rejected.iter().find(|r| r.event_id == event_id)
    }
}

/// One refused event. The server may send `reason`, `code`, or both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedEvent {
    pub event_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default)]
    pub details: Value,
}

impl RejectedEvent {
    /// Human-readable reason, falling back to the code.
    pub fn reason_text(&self) -> String {
        self.reason
            .clone()
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "rejected".to_string())
    }

    /// Machine code, falling back to the reason.
    pub fn reject_code(&self) -> RejectCode {
        match self.code.as_deref().or(self.reason.as_deref()) {
            Some(code) => RejectCode::from(code),
            None => RejectCode::DomainRuleViolation,
        }
    }
}

// =============================================================================
// Pull
// =============================================================================

/// Body of `POST /sync/pull`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullRequest {
    pub device_id: String,
    pub cursor: i64,
    pub limit: usize,
}

/// One page of server-side changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PullResponse {
    #[serde(default)]
    pub updates: Vec<ServerUpdate>,
    pub server_cursor: i64,
    pub has_more: bool,
}

/// A single change-log row from the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerUpdate {
    pub cursor: i64,
    /// Entity kind, e.g. "customer", "product".
    pub entity: String,
    /// Operation, e.g. "upsert", "delete".
    pub op: String,
    pub entity_id: String,
    #[serde(default)]
    pub payload: Payload,
}

// =============================================================================
// Conflict Audit
// =============================================================================

/// Remediation action recorded by the audit sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    RetryExact,
    CloneEdit,
    Discard,
}

impl std::fmt::Display for ConflictAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictAction::RetryExact => write!(f, "retry_exact"),
            ConflictAction::CloneEdit => write!(f, "clone_edit"),
            ConflictAction::Discard => write!(f, "discard"),
        }
    }
}

/// Body of `POST /sync/conflict-action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictActionRequest {
    pub device_id: String,
    pub action: ConflictAction,
    pub event_id: String,
    pub event_type: String,
    pub reason: String,
    pub payload_snapshot: Payload,
    #[serde(default)]
    pub details: Value,
}

// =============================================================================
// Error Envelope
// =============================================================================

/// Standard error body for non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Value,
    #[serde(default)]
    pub status: Option<u16>,
}

/// Accepts a number, or ignores anything else (null, string).
fn numeric_cursor<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| v.as_i64()))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_push_response_decoding() {
        let response: PushResponse = serde_json::from_value(json!({
            "acknowledged": ["a", "b"],
            "rejected": [
                {"event_id": "c", "reason": "validation_failed", "code": "validation_failed",
                 "details": {"name": ["required"]}}
            ],
            "server_cursor": 17,
            "validate_only": false
        }))
        .unwrap();

        assert_eq!(
            response.completed_ids().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(response.is_acknowledged("b"));
        assert_eq!(response.server_cursor, Some(17));
        assert_eq!(
            response.rejection_for("c").unwrap().reject_code(),
            RejectCode::ValidationFailed
        );
    }

    #[test]
    fn test_push_response_non_numeric_cursor_is_ignored() {
        let response: PushResponse = serde_json::from_value(json!({
            "acknowledged": [], "rejected": [], "server_cursor": "17"
        }))
        .unwrap();
        assert_eq!(response.server_cursor, None);

        let response: PushResponse =
            serde_json::from_value(json!({"acknowledged": [], "rejected": []})).unwrap();
        assert!(response.acknowledged.is_empty());
        assert_eq!(response.server_cursor, None);
    }

    #[test]
    fn test_push_response_requires_verdict_lists() {
        assert!(serde_json::from_value::<PushResponse>(json!({})).is_err());
        assert!(serde_json::from_value::<PushResponse>(json!({"acknowledged": ["a"]})).is_err());
        assert!(serde_json::from_value::<PushResponse>(json!({"rejected": []})).is_err());
    }

    #[test]
    fn test_rejection_fallbacks() {
        let only_reason = RejectedEvent {
            event_id: "x".into(),
            reason: Some("forbidden".into()),
            code: None,
            details: Value::Null,
        };
        assert_eq!(only_reason.reject_code(), RejectCode::Forbidden);
        assert_eq!(only_reason.reason_text(), "forbidden");

        let bare: RejectedEvent = serde_json::from_value(json!({"event_id": "y"})).unwrap();
        assert_eq!(bare.reject_code(), RejectCode::DomainRuleViolation);
        assert_eq!(bare.reason_text(), "rejected");
    }

    #[test]
    fn test_pull_response_requires_has_more() {
        let missing = serde_json::from_value::<PullResponse>(json!({
            "updates": [],
            "server_cursor": 3
        }));
        assert!(missing.is_err());

        let page: PullResponse = serde_json::from_value(json!({
            "updates": [{"cursor": 3, "entity": "customer", "op": "upsert",
                         "entity_id": "c-1", "payload": {"name": "Bob"}}],
            "server_cursor": 3,
            "has_more": false
        }))
        .unwrap();
        assert_eq!(page.updates[0].entity, "customer");
        assert_eq!(page.updates[0].payload["name"], json!("Bob"));
    }

    #[test]
    fn test_conflict_action_wire_names() {
        assert_eq!(
            serde_json::to_value(ConflictAction::RetryExact).unwrap(),
            json!("retry_exact")
        );
        assert_eq!(ConflictAction::CloneEdit.to_string(), "clone_edit");
    }

    #[test]
    fn test_error_envelope_partial() {
        let envelope: ErrorEnvelope =
            serde_json::from_value(json!({"code": "forbidden", "message": "nope"})).unwrap();
        assert_eq!(envelope.code.as_deref(), Some("forbidden"));
        assert_eq!(envelope.errors, Value::Null);
    }
}
