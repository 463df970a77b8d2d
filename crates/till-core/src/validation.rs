//! # Validation Module
//!
//! Input validation for events entering the outbox and for remediation
//! requests coming from the UI.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI collaborator                                              │
//! │  ├── Form checks (empty, length)                                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: till-sync event factory                                      │
//! │  └── THIS MODULE: shape checks before anything is persisted            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Sync server                                                  │
//! │  └── Domain rules → rejected[] with reason / details                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Maximum length of an event type tag (the server column is 64 chars).
pub const MAX_EVENT_TYPE_LEN: usize = 64;

/// Maximum length of a discard reason.
pub const MAX_REASON_LEN: usize = 500;

/// Reason recorded when the operator discards without giving one.
pub const DEFAULT_DISCARD_REASON: &str = "discarded";

/// Validates an event type tag such as `customer.upsert`.
///
/// ## Rules
/// - Must not be empty
/// - At most 64 characters
/// - Lowercase letters, digits, `.`, `_` and `-` only
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_event_type;
///
/// assert!(validate_event_type("stock.transfer.create").is_ok());
/// assert!(validate_event_type("").is_err());
/// assert!(validate_event_type("Customer Upsert").is_err());
/// ```
pub fn validate_event_type(event_type: &str) -> ValidationResult<()> {
    if event_type.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "event_type".to_string(),
        });
    }

    if event_type.len() > MAX_EVENT_TYPE_LEN {
        return Err(ValidationError::TooLong {
            field: "event_type".to_string(),
            max: MAX_EVENT_TYPE_LEN,
        });
    }

    if !event_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "event_type".to_string(),
            reason: "must contain only lowercase letters, digits, '.', '_' and '-'".to_string(),
        });
    }

    Ok(())
}

/// Cleans up the operator-supplied reason for discarding a failed event.
///
/// Discarding never fails on the reason: a blank one becomes
/// [`DEFAULT_DISCARD_REASON`] and a long one is cut to
/// [`MAX_REASON_LEN`] characters.
pub fn normalize_discard_reason(reason: &str) -> String {
    let reason = reason.trim();

    if reason.is_empty() {
        return DEFAULT_DISCARD_REASON.to_string();
    }

    reason.chars().take(MAX_REASON_LEN).collect()
}

/// Validates a batch / page size against an inclusive range.
pub fn validate_limit(field: &str, value: usize, max: usize) -> ValidationResult<()> {
    if value == 0 || value > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: max as i64,
        });
    }
    Ok(())
}
