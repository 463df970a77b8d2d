//! # till-sync: Offline-First Sync Engine for Till
//!
//! This crate keeps a POS device working while offline and converges it
//! with the sync server once the network is back.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │  business pages ── enqueue_event ──┐        Sync Center ── retry /     │
//! │                                    │        clone / discard / export   │
//! │                                    ▼                     │              │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     SyncEngine (engine.rs)                       │  │
//! │  │                                                                  │  │
//! │  │  ┌───────────┐   ┌──────────────┐   ┌─────────────────────────┐ │  │
//! │  │  │  Outbox   │   │ Failure      │   │ Server cursor +         │ │  │
//! │  │  │ (pending) │   │ Ledger       │   │ last push/pull success  │ │  │
//! │  │  └─────┬─────┘   └──────▲───────┘   └───────────▲─────────────┘ │  │
//! │  │        │ push.rs        │ rejected / failed     │ pull.rs       │  │
//! │  └────────┼────────────────┼───────────────────────┼───────────────┘  │
//! │           ▼                │                       │                   │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  SyncTransport (transport.rs)   POST /sync/push  /sync/pull      │  │
//! │  │                                 POST /sync/conflict-action       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Durable state: till_db::LocalStore (persist.rs)                       │
//! │  Timing:        two single-flight lanes, 4000ms each (scheduler.rs)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - TOML configuration with `TILL_*` environment overrides
//! - [`engine`] - `SyncEngine` handle, lifecycle, observable state
//! - [`error`] - Sync error types
//! - [`factory`] - Builds stamped events from the runtime context
//! - [`ledger`] - Failure ledger and export document
//! - [`outbox`] - Ordered queue of unacknowledged events
//! - [`persist`] - Typed access to the durable keys
//! - [`protocol`] - Request / response bodies
//! - [`pull`] - Cursor-paged pull and the `UpdateApplier` seam
//! - [`push`] - Batch push and verdict handling
//! - [`remediation`] - Retry, clone-and-edit, discard, bulk retry, export
//! - [`scheduler`] - Background push / pull loops
//! - [`state`] - In-memory state and UI snapshot
//! - [`transport`] - HTTP transport
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use till_sync::{HttpTransport, SyncConfig, SyncEngine};
//!
//! let config = SyncConfig::load_or_default(None);
//! let transport = Arc::new(HttpTransport::new(&config.server)?);
//!
//! let engine = SyncEngine::builder(config.sync.clone(), store, transport)
//!     .build()
//!     .await?;
//! engine.start(config.runtime_context()).await?;
//!
//! engine.enqueue_event("customer.upsert", payload).await?;
//! println!("Pending: {}", engine.pending_count().await);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod factory;
pub mod ledger;
pub mod outbox;
pub mod persist;
pub mod protocol;
pub mod pull;
pub mod push;
pub mod remediation;
pub mod scheduler;
pub mod state;
pub mod transport;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{CursorPolicy, SyncConfig, SyncSettings};
pub use engine::{NoOpEmitter, SyncEngine, SyncEngineBuilder, SyncEventEmitter};
pub use error::{SyncError, SyncResult};
pub use ledger::FailureExport;
pub use protocol::{
    ConflictAction, ConflictActionRequest, PullRequest, PullResponse, PushRequest, PushResponse,
    RejectedEvent, ServerUpdate,
};
pub use pull::{NoOpApplier, PullOutcome, UpdateApplier};
pub use push::{PushOutcome, SkipReason};
pub use remediation::{BulkRetryItem, RetryOutcome};
pub use state::SyncSnapshot;
pub use transport::{HttpTransport, SyncTransport};
