//! # Domain Types
//!
//! Core domain types used throughout the Till sync engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ RuntimeContext  │   │     Event       │   │  FailureEntry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  device_id      │──►│  event_id       │──►│  id (local)     │       │
//! │  │  branch_id      │   │  event_type     │   │  event_id       │       │
//! │  │  user_id        │   │  payload        │   │  payload_snap.  │       │
//! │  │  shift          │   │  created_at     │   │  retries_count  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │  ShiftSummary   │   │   RejectCode    │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  opened_at      │   │  validation_... │                             │
//! │  │  expected_amt   │   │  forbidden      │                             │
//! │  └─────────────────┘   │  conflict       │                             │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity Rules
//! - `Event::event_id`: client-generated UUID v4, immutable once created.
//!   Every retransmission reuses it so the server can deduplicate.
//! - `FailureEntry::id`: local UUID v4, distinct from the event id. Stays the
//!   same across retries so UI selection state stays valid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

/// Opaque mutation payload: a JSON object.
pub type Payload = Map<String, Value>;

/// Payload keys stamped by the event factory.
pub mod payload_keys {
    pub const BRANCH_ID: &str = "branch_id";
    pub const DEVICE_ID: &str = "device_id";
    pub const USER_ID: &str = "user_id";
    pub const SHIFT_SUMMARY: &str = "shift_summary";
}

// =============================================================================
// Shift Summary
// =============================================================================

/// Snapshot of the cashier's active shift, frozen into each event payload.
///
/// Amounts are decimal strings exactly as the server reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSummary {
    pub id: String,
    pub cashier_id: String,
    pub device_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_amount: String,
    pub expected_amount: String,
    pub variance: Option<String>,
}

// =============================================================================
// Runtime Context
// =============================================================================

/// The (device, branch, user) triple supplied by the host application.
///
/// Sync is disabled unless all three are present. Blank strings count as
/// missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeContext {
    pub device_id: Option<String>,
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    /// Active shift, if a cash shift is open on this device.
    #[serde(default)]
    pub shift: Option<ShiftSummary>,
}

impl RuntimeContext {
    /// Creates a complete context without an open shift.
    pub fn new(
        device_id: impl Into<String>,
        branch_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        RuntimeContext {
            device_id: Some(device_id.into()),
            branch_id: Some(branch_id.into()),
            user_id: Some(user_id.into()),
            shift: None,
        }
    }

    /// Attaches the active shift snapshot.
    pub fn with_shift(mut self, shift: ShiftSummary) -> Self {
        self.shift = Some(shift);
        self
    }

    /// The "canSync" gate.
    pub fn can_sync(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Returns the trimmed device id, if present.
    pub fn device_id(&self) -> Option<&str> {
        present(&self.device_id)
    }

    /// Names of the context fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            ("device_id", &self.device_id),
            ("branch_id", &self.branch_id),
            ("user_id", &self.user_id),
        ]
        .into_iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    /// Resolves into a [`BoundContext`], failing if any field is missing.
    pub fn bind(&self) -> CoreResult<BoundContext> {
        match (
            present(&self.device_id),
            present(&self.branch_id),
            present(&self.user_id),
        ) {
            (Some(device_id), Some(branch_id), Some(user_id)) => Ok(BoundContext {
                device_id: device_id.to_string(),
                branch_id: branch_id.to_string(),
                user_id: user_id.to_string(),
                shift: self.shift.clone(),
            }),
            _ => Err(CoreError::MissingRuntimeContext {
                missing: self.missing_fields(),
            }),
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// A runtime context with every required field present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundContext {
    pub device_id: String,
    pub branch_id: String,
    pub user_id: String,
    pub shift: Option<ShiftSummary>,
}

impl BoundContext {
    /// Stamps branch / device / user / shift into a payload.
    ///
    /// Stamped keys overwrite caller-supplied keys of the same name.
    pub fn stamp(&self, mut payload: Payload) -> Payload {
        payload.insert(
            payload_keys::BRANCH_ID.to_string(),
            Value::String(self.branch_id.clone()),
        );
        payload.insert(
            payload_keys::DEVICE_ID.to_string(),
            Value::String(self.device_id.clone()),
        );
        payload.insert(
            payload_keys::USER_ID.to_string(),
            Value::String(self.user_id.clone()),
        );
        let shift = match &self.shift {
            Some(shift) => serde_json::to_value(shift).unwrap_or(Value::Null),
            None => Value::Null,
        };
        payload.insert(payload_keys::SHIFT_SUMMARY.to_string(), shift);
        payload
    }
}

// =============================================================================
// Event
// =============================================================================

/// A single local mutation intent queued in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Event {
    pub event_id: String,
    /// Mutation tag, e.g. "customer.upsert".
    pub event_type: String,
    #[ts(type = "Record<string, unknown>")]
    pub payload: Payload,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event with a fresh `event_id`.
    pub fn new(event_type: impl Into<String>, payload: Payload, created_at: DateTime<Utc>) -> Self {
        Event {
            event_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            payload,
            created_at,
        }
    }
}

/// Shallow merge: keys in `patch` replace keys in `base`.
pub fn merge_payload(base: &Payload, patch: &Payload) -> Payload {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Converts an arbitrary JSON value into a payload object.
pub fn payload_from_value(value: Value) -> CoreResult<Payload> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::PayloadNotObject {
            kind: json_kind(&other).to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// =============================================================================
// Reject Codes
// =============================================================================

/// Reason code attached to a failure entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectCode {
    /// Server-side validation of the payload failed.
    ValidationFailed,
    /// Payload is outside the device's branch / permission scope.
    Forbidden,
    /// Uniqueness or state conflict on the server.
    Conflict,
    /// Generic code used when the push call itself failed.
    DomainRuleViolation,
    /// Any code the server sends that we don't know about yet.
    Other(String),
}

impl RejectCode {
    pub fn as_str(&self) -> &str {
        match self {
            RejectCode::ValidationFailed => "validation_failed",
            RejectCode::Forbidden => "forbidden",
            RejectCode::Conflict => "conflict",
            RejectCode::DomainRuleViolation => "domain_rule_violation",
            RejectCode::Other(code) => code,
        }
    }
}

impl From<&str> for RejectCode {
    fn from(code: &str) -> Self {
        match code {
            "validation_failed" => RejectCode::ValidationFailed,
            "forbidden" => RejectCode::Forbidden,
            "conflict" => RejectCode::Conflict,
            "domain_rule_violation" => RejectCode::DomainRuleViolation,
            other => RejectCode::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for RejectCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Failure Entry
// =============================================================================

/// Why an event ended up (or stays) in the failure ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReason {
    pub reason: String,
    pub code: RejectCode,
    pub details: Value,
    /// Set when the server actually answered (domain rejection).
    pub responded_at: Option<DateTime<Utc>>,
}

impl FailureReason {
    /// A server-side rejection received at `at`.
    pub fn rejected(
        reason: impl Into<String>,
        code: RejectCode,
        details: Value,
        at: DateTime<Utc>,
    ) -> Self {
        FailureReason {
            reason: reason.into(),
            code,
            details,
            responded_at: Some(at),
        }
    }

    /// The push call itself failed; nothing came back from the server.
    pub fn transport(reason: impl Into<String>, code: RejectCode, details: Value) -> Self {
        FailureReason {
            reason: reason.into(),
            code,
            details,
            responded_at: None,
        }
    }
}

/// Ledger record of a rejected or errored event awaiting remediation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct FailureEntry {
    pub id: String,
    pub event_id: String,
    pub event_type: String,
    /// Payload frozen at the time of failure.
    #[ts(type = "Record<string, unknown>")]
    pub payload_snapshot: Payload,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub failed_at: DateTime<Utc>,
    pub reason: String,
    pub reason_code: String,
    #[ts(type = "unknown")]
    #[serde(default)]
    pub server_details: Value,
    pub retries_count: u32,
    #[ts(as = "Option<String>")]
    #[serde(default)]
    pub last_server_response_at: Option<DateTime<Utc>>,
}

impl FailureEntry {
    /// Creates a fresh entry (retries_count = 0) for a failed event.
    pub fn new(event: &Event, failure: FailureReason, failed_at: DateTime<Utc>) -> Self {
        FailureEntry {
            id: Uuid::new_v4().to_string(),
            event_id: event.event_id.clone(),
            event_type: event.event_type.clone(),
            payload_snapshot: event.payload.clone(),
            created_at: event.created_at,
            failed_at,
            reason: failure.reason,
            reason_code: failure.code.as_str().to_string(),
            server_details: failure.details,
            retries_count: 0,
            last_server_response_at: failure.responded_at,
        }
    }

    /// Rebuilds the original event from the frozen snapshot.
    ///
    /// The `event_id` is reused so the server can deduplicate.
    pub fn to_event(&self) -> Event {
        Event {
            event_id: self.event_id.clone(),
            event_type: self.event_type.clone(),
            payload: self.payload_snapshot.clone(),
            created_at: self.created_at,
        }
    }

    /// Records another failed retry in place. Identity (`id`) is preserved.
    pub fn record_retry_failure(&mut self, failure: FailureReason, failed_at: DateTime<Utc>) {
        self.retries_count = self.retries_count.saturating_add(1);
        self.failed_at = failed_at;
        self.reason = failure.reason;
        self.reason_code = failure.code.as_str().to_string();
        self.server_details = failure.details;
        if failure.responded_at.is_some() {
            self.last_server_response_at = failure.responded_at;
        }
    }

    /// Parsed reason code.
    pub fn code(&self) -> RejectCode {
        RejectCode::from(self.reason_code.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
