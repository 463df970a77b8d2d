//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  MissingRuntime │  │  Transport      │  │  MalformedResponse      │ │
//! │  │  InvalidConfig  │  │  HttpStatus     │  │  SerializationFailed    │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Storage      │  │  Remediation    │                              │
//! │  │                 │  │                 │                              │
//! │  │  Storage        │  │  FailureNotFound│                              │
//! │  │                 │  │  InvalidPatch   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Background push/pull never return these to the UI: they are turned into
//! ledger entries and log lines. Only direct calls (enqueue, remediation)
//! surface them.

use serde_json::Value;
use thiserror::Error;
use till_core::{CoreError, FailureReason, RejectCode};

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Device, branch or user is missing from the runtime context.
    #[error("Missing runtime sync context: {}", missing.join(", "))]
    MissingRuntimeContext { missing: Vec<String> },

    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid server URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Caller-supplied input failed validation (event type, reason, payload).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The request never got a response (DNS, refused, reset).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with a non-2xx status.
    ///
    /// `code` / `message` / `details` come from the server's error envelope
    /// when the body carried one.
    #[error("Server returned HTTP {status}: {message}")]
    HttpStatus {
        status: u16,
        code: Option<String>,
        message: String,
        details: Value,
    },

    /// The request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// A 2xx response whose body doesn't match the expected shape.
    #[error("Malformed server response: {0}")]
    MalformedResponse(String),

    /// Failed to serialize or deserialize a value.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The durable local store failed.
    #[error("Local store error: {0}")]
    Storage(String),

    // =========================================================================
    // Remediation Errors
    // =========================================================================
    /// No failure entry with this local id.
    #[error("Failure entry not found: {id}")]
    FailureNotFound { id: String },

    /// Clone-and-edit patch is not a JSON object.
    #[error("Invalid payload patch: {0}")]
    InvalidPatch(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<till_db::DbError> for SyncError {
    fn from(err: till_db::DbError) -> Self {
        SyncError::Storage(err.to_string())
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::MissingRuntimeContext { missing } => {
                SyncError::MissingRuntimeContext { missing }
            }
            other => SyncError::InvalidInput(other.to_string()),
        }
    }
}

impl From<till_core::ValidationError> for SyncError {
    fn from(err: till_core::ValidationError) -> Self {
        SyncError::InvalidInput(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::HttpStatus {
                status: status.as_u16(),
                code: None,
                message: err.to_string(),
                details: Value::Null,
            }
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the same call could succeed later without any change.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport(_) | SyncError::Timeout(_) => true,
            SyncError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::MissingRuntimeContext { .. }
                | SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the server's answer couldn't be understood.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            SyncError::MalformedResponse(_) | SyncError::SerializationFailed(_)
        )
    }

    /// Returns true if the failure happened on the way to or from the server.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_)
                | SyncError::HttpStatus { .. }
                | SyncError::Timeout(_)
                | SyncError::MalformedResponse(_)
        )
    }

    /// Short label for logs.
    pub fn category(&self) -> &'static str {
        if self.is_protocol_error() {
            "protocol"
        } else if self.is_transport_error() {
            "transport"
        } else if self.is_config_error() {
            "config"
        } else if matches!(self, SyncError::Storage(_)) {
            "storage"
        } else {
            "other"
        }
    }

    /// Ledger classification for a failed push call.
    ///
    /// An error envelope's `code` / `message` / `errors` win; anything else
    /// is recorded as `domain_rule_violation` with the error text as reason.
    pub fn to_failure_reason(&self) -> FailureReason {
        match self {
            SyncError::HttpStatus {
                code: Some(code),
                message,
                details,
                ..
            } => FailureReason::transport(message.clone(), RejectCode::from(code.as_str()), details.clone()),
            SyncError::HttpStatus {
                message, details, ..
            } => FailureReason::transport(
                message.clone(),
                RejectCode::DomainRuleViolation,
                details.clone(),
            ),
            other => FailureReason::transport(
                other.to_string(),
                RejectCode::DomainRuleViolation,
                Value::Null,
            ),
        }
    }
}
