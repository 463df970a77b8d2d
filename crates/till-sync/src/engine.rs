//! # Sync Engine
//!
//! The handle the host application holds. It owns the outbox, the failure
//! ledger, the server cursor and the success timestamps, and exposes the
//! operations business pages and the Sync Center call.
//!
//! ## Sync Engine Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncEngine Lifecycle                             │
//! │                                                                         │
//! │  SyncEngine::builder(settings, store, transport).build().await         │
//! │       │  loads outbox / ledger / cursor / timestamps from the store    │
//! │       ▼                                                                 │
//! │  ┌──────────┐   start(ctx), ctx complete    ┌──────────────────────┐   │
//! │  │  Closed  │ ─────────────────────────────►│  Scheduled           │   │
//! │  │ (no ctx) │                               │  push lane + pull    │   │
//! │  └──────────┘ ◄──────────────────────────── │  lane every 4000ms   │   │
//! │       ▲        start(ctx), ctx incomplete   └──────────────────────┘   │
//! │       │        or stop()                             │                  │
//! │       │                                              │                  │
//! │       └──────────────── enqueue / push_now / pull_now / remediation ───│
//! │                         work in every state (gated by can_sync)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! Push and pull are separate single-flight lanes and may overlap. State is
//! behind one `tokio::sync::RwLock`; network calls happen with the lock
//! released, and every mutation is persisted before the lock is dropped.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use till_core::{Event, Payload, RuntimeContext};
use till_db::LocalStore;

use crate::config::SyncSettings;
use crate::error::SyncResult;
use crate::factory::build_event;
use crate::ledger::FailureExport;
use crate::persist::SyncStore;
use crate::pull::{NoOpApplier, PullOutcome, UpdateApplier};
use crate::push::PushOutcome;
use crate::remediation::{BulkRetryItem, RetryOutcome};
use crate::scheduler::{Lane, Scheduler};
use crate::state::{SyncSnapshot, SyncState};
use crate::transport::SyncTransport;

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives state changes (implemented by the UI integration).
pub trait SyncEventEmitter: Send + Sync {
    /// Called after every state change with the new snapshot.
    fn emit_snapshot(&self, snapshot: &SyncSnapshot);

    /// Called when a background run failed and the failure was swallowed.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_snapshot(&self, _snapshot: &SyncSnapshot) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Shared Engine Core
// =============================================================================

/// State and collaborators shared by the engine handle and lane tasks.
pub(crate) struct Shared {
    pub(crate) settings: SyncSettings,
    pub(crate) store: SyncStore,
    pub(crate) transport: Arc<dyn SyncTransport>,
    pub(crate) applier: Arc<dyn UpdateApplier>,
    pub(crate) emitter: Arc<dyn SyncEventEmitter>,
    pub(crate) state: RwLock<SyncState>,
    pub(crate) context: RwLock<RuntimeContext>,
    pub(crate) push_lane: Lane,
    pub(crate) pull_lane: Lane,
}

impl Shared {
    pub(crate) async fn can_sync(&self) -> bool {
        self.context.read().await.can_sync()
    }

    /// Device id of a complete context, or `MissingRuntimeContext`.
    pub(crate) async fn bound_device_id(&self) -> SyncResult<String> {
        Ok(self.context.read().await.bind()?.device_id)
    }

    /// Publishes the current snapshot. Must not be called with the state
    /// write lock held.
    pub(crate) async fn emit(&self) {
        let can_sync = self.can_sync().await;
        let snapshot = self.state.read().await.snapshot(can_sync);
        self.emitter.emit_snapshot(&snapshot);
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`SyncEngine`] from its collaborators.
pub struct SyncEngineBuilder {
    settings: SyncSettings,
    store: Arc<dyn LocalStore>,
    transport: Arc<dyn SyncTransport>,
    applier: Arc<dyn UpdateApplier>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncEngineBuilder {
    /// Sets the collaborator that applies pulled server updates.
    pub fn applier(mut self, applier: Arc<dyn UpdateApplier>) -> Self {
        self.applier = applier;
        self
    }

    /// Sets the state-change listener.
    pub fn emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = emitter;
        self
    }

    /// Loads persisted state and returns a closed (unscheduled) engine.
    ///
    /// Fails with `InvalidConfig` if the settings can't drive the lanes.
    pub async fn build(self) -> SyncResult<SyncEngine> {
        self.settings.validate()?;

        let store = SyncStore::new(self.store);
        let persisted = store.load().await?;

        info!(
            pending = persisted.outbox.len(),
            failed = persisted.failed_events.len(),
            cursor = persisted.server_cursor,
            "Sync engine loaded persisted state"
        );

        let shared = Shared {
            settings: self.settings,
            store,
            transport: self.transport,
            applier: self.applier,
            emitter: self.emitter,
            state: RwLock::new(SyncState::from(persisted)),
            context: RwLock::new(RuntimeContext::default()),
            push_lane: Lane::new("push"),
            pull_lane: Lane::new("pull"),
        };

        Ok(SyncEngine {
            shared: Arc::new(shared),
            scheduler: Arc::new(Mutex::new(None)),
        })
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// Cloneable handle to the sync engine.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
    scheduler: Arc<Mutex<Option<Scheduler>>>,
}

impl SyncEngine {
    /// Starts building an engine over the given store and transport.
    pub fn builder(
        settings: SyncSettings,
        store: Arc<dyn LocalStore>,
        transport: Arc<dyn SyncTransport>,
    ) -> SyncEngineBuilder {
        SyncEngineBuilder {
            settings,
            store,
            transport,
            applier: Arc::new(NoOpApplier),
            emitter: Arc::new(NoOpEmitter),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Replaces the runtime context without touching the scheduler.
    ///
    /// The device id, if present, is persisted as the bound device.
    pub async fn set_context(&self, context: RuntimeContext) -> SyncResult<()> {
        if let Some(device_id) = context.device_id() {
            self.shared.store.save_device_id(device_id).await?;
        }
        debug!(can_sync = context.can_sync(), "Runtime context updated");
        *self.shared.context.write().await = context;
        self.shared.emit().await;
        Ok(())
    }

    /// Applies the context and schedules both lanes if it is complete.
    ///
    /// An incomplete context stops the scheduler instead: sync is closed,
    /// not failed.
    pub async fn start(&self, context: RuntimeContext) -> SyncResult<()> {
        let can_sync = context.can_sync();
        self.set_context(context).await?;

        let mut slot = self.scheduler.lock().await;
        if can_sync {
            if slot.is_none() {
                info!("Starting sync scheduler");
                *slot = Some(Scheduler::spawn(self.shared.clone()));
            }
        } else if let Some(scheduler) = slot.take() {
            warn!("Runtime context incomplete, stopping sync scheduler");
            scheduler.stop().await;
        }
        Ok(())
    }

    /// Stops scheduling. In-flight runs complete; manual calls still work.
    pub async fn stop(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            info!("Stopping sync scheduler");
            scheduler.stop().await;
        }
    }

    pub async fn is_scheduled(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    // =========================================================================
    // Event Factory
    // =========================================================================

    /// Builds, queues and persists a new event.
    ///
    /// Fails before anything is written if the runtime context is
    /// incomplete or the event type is invalid.
    pub async fn enqueue_event(&self, event_type: &str, payload: Payload) -> SyncResult<Event> {
        let event = {
            let context = self.shared.context.read().await;
            build_event(&context, event_type, payload, Utc::now())?
        };

        {
            let mut state = self.shared.state.write().await;
            let mut next = state.outbox.clone();
            next.push_back(event.clone());
            self.shared.store.save_outbox(next.events()).await?;
            state.outbox = next;
        }

        info!(
            event_id = %event.event_id,
            event_type = %event.event_type,
            "Event queued"
        );
        self.shared.emit().await;
        Ok(event)
    }

    // =========================================================================
    // Push / Pull
    // =========================================================================

    /// Pushes one batch now. Never fails; see [`PushOutcome`].
    pub async fn push_now(&self) -> PushOutcome {
        self.shared.push_now().await
    }

    /// Pulls until caught up. Never fails; see [`PullOutcome`].
    pub async fn pull_now(&self) -> PullOutcome {
        self.shared.pull_now().await
    }

    // =========================================================================
    // Remediation
    // =========================================================================

    /// Resubmits a failed event with its original id.
    pub async fn retry_failed_event(
        &self,
        failure_id: &str,
        validate_only: bool,
    ) -> SyncResult<RetryOutcome> {
        self.shared.retry_failed_event(failure_id, validate_only).await
    }

    /// Queues a patched copy of a failed event under a new id.
    pub async fn clone_and_edit_failed_event(
        &self,
        failure_id: &str,
        patch: serde_json::Value,
    ) -> SyncResult<Event> {
        self.shared.clone_and_edit_failed_event(failure_id, patch).await
    }

    /// Removes a failure entry for good.
    pub async fn discard_failed_event(
        &self,
        failure_id: &str,
        reason: &str,
    ) -> SyncResult<till_core::FailureEntry> {
        self.shared.discard_failed_event(failure_id, reason).await
    }

    /// Retries each id in order, one at a time.
    pub async fn bulk_retry_failed_events(&self, failure_ids: &[String]) -> Vec<BulkRetryItem> {
        self.shared.bulk_retry_failed_events(failure_ids).await
    }

    /// Copies the ledger into an export document. Read-only.
    pub async fn export_failure_log(&self) -> SyncResult<FailureExport> {
        self.shared.export_failure_log().await
    }

    // =========================================================================
    // Observable State
    // =========================================================================

    pub async fn snapshot(&self) -> SyncSnapshot {
        let can_sync = self.shared.can_sync().await;
        self.shared.state.read().await.snapshot(can_sync)
    }

    pub async fn can_sync(&self) -> bool {
        self.shared.can_sync().await
    }

    pub async fn server_cursor(&self) -> i64 {
        self.shared.state.read().await.server_cursor
    }

    pub async fn pending_count(&self) -> usize {
        self.shared.state.read().await.outbox.len()
    }

    /// Device id persisted by the last context that carried one.
    pub async fn stored_device_id(&self) -> SyncResult<Option<String>> {
        self.shared.store.device_id().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
