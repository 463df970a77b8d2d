//! # till-core: Pure Sync Domain Types
//!
//! This crate holds the domain types the Till sync engine moves around:
//! events queued in the outbox, failure entries in the remediation ledger,
//! and the runtime context that gates whether sync may run at all.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Till Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │             UI / business pages (external collaborator)         │   │
//! │  │    POS ──► Customers ──► Stock ──► Sync Center                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ enqueue_event / remediation            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-sync (engine)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │   error   │  │ validation│                  │   │
//! │  │   │  Event    │  │ CoreError │  │   rules   │                  │   │
//! │  │   │  Failure  │  │           │  │   checks  │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use till_core::{Event, RuntimeContext};
//! use serde_json::json;
//!
//! let ctx = RuntimeContext::new("device-1", "branch-1", "cashier-1");
//! let bound = ctx.bind().unwrap();
//!
//! let payload = till_core::payload_from_value(json!({"name": "Bob"})).unwrap();
//! let event = Event::new("customer.upsert", bound.stamp(payload), chrono::Utc::now());
//!
//! assert_eq!(event.payload["branch_id"], json!("branch-1"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
