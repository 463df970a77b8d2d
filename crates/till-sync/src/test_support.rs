//! Scripted fakes and an engine harness shared by the unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, Semaphore};

use till_core::{payload_from_value, Payload, RuntimeContext};
use till_db::{DbError, DbResult, LocalStore, MemoryStore};

use crate::config::{CursorPolicy, SyncSettings};
use crate::engine::{SyncEngine, SyncEventEmitter};
use crate::error::{SyncError, SyncResult};
use crate::persist::SyncStore;
use crate::protocol::{
    ConflictActionRequest, PullRequest, PullResponse, PushRequest, PushResponse, ServerUpdate,
};
use crate::pull::UpdateApplier;
use crate::state::SyncSnapshot;
use crate::transport::SyncTransport;

pub fn context() -> RuntimeContext {
    RuntimeContext::new("register-1", "branch-1", "cashier-1")
}

pub fn payload(value: Value) -> Payload {
    payload_from_value(value).expect("test payload must be an object")
}

pub fn update(cursor: i64) -> ServerUpdate {
    ServerUpdate {
        cursor,
        entity: "product".into(),
        op: "upsert".into(),
        entity_id: format!("product-{cursor}"),
        payload: Payload::new(),
    }
}

// =============================================================================
// Gate
// =============================================================================

/// Parks transport calls until released.
pub struct CallGate {
    entered: Notify,
    permits: Semaphore,
}

impl CallGate {
    fn new() -> Self {
        CallGate {
            entered: Notify::new(),
            permits: Semaphore::new(0),
        }
    }

    /// Resolves once a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Lets every parked and future call through.
    pub fn release(&self) {
        self.permits.close();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        // closed semaphore means released
        let _ = self.permits.acquire().await;
    }
}

// =============================================================================
// Fake Transport
// =============================================================================

#[derive(Default)]
pub struct FakeTransport {
    push_script: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_script: Mutex<VecDeque<SyncResult<PullResponse>>>,
    pushes: Mutex<Vec<PushRequest>>,
    pulls: Mutex<Vec<PullRequest>>,
    audits: Mutex<Vec<ConflictActionRequest>>,
    push_gate: Mutex<Option<Arc<CallGate>>>,
    pull_gate: Mutex<Option<Arc<CallGate>>>,
    fail_audits: AtomicBool,
}

impl FakeTransport {
    /// Queues the response for the next push. Unscripted pushes
    /// acknowledge everything they carry.
    pub fn script_push(&self, response: SyncResult<PushResponse>) {
        self.push_script.lock().unwrap().push_back(response);
    }

    /// Queues the response for the next pull. Unscripted pulls return an
    /// empty, final page at the request cursor.
    pub fn script_pull(&self, response: SyncResult<PullResponse>) {
        self.pull_script.lock().unwrap().push_back(response);
    }

    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pulls.lock().unwrap().clone()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.lock().unwrap().len()
    }

    pub fn audits(&self) -> Vec<ConflictActionRequest> {
        self.audits.lock().unwrap().clone()
    }

    pub fn fail_audits(&self) {
        self.fail_audits.store(true, Ordering::SeqCst);
    }

    pub fn hold_pushes(&self) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::new());
        *self.push_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn hold_pulls(&self) -> Arc<CallGate> {
        let gate = Arc::new(CallGate::new());
        *self.pull_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SyncTransport for FakeTransport {
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.pushes.lock().unwrap().push(request.clone());

        let gate = self.push_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let scripted = self.push_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(PushResponse {
                acknowledged: request.events.iter().map(|e| e.event_id.clone()).collect(),
                ..Default::default()
            })
        })
    }

    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pulls.lock().unwrap().push(request.clone());

        let gate = self.pull_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }

        let scripted = self.pull_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(PullResponse {
                updates: Vec::new(),
                server_cursor: request.cursor,
                has_more: false,
            })
        })
    }

    async fn conflict_action(&self, request: &ConflictActionRequest) -> SyncResult<()> {
        if self.fail_audits.load(Ordering::SeqCst) {
            return Err(SyncError::Transport("audit sink unreachable".into()));
        }
        self.audits.lock().unwrap().push(request.clone());
        Ok(())
    }
}

// =============================================================================
// Recording Collaborators
// =============================================================================

#[derive(Default)]
pub struct RecordingApplier {
    batches: Mutex<Vec<Vec<ServerUpdate>>>,
    fail_next: AtomicBool,
}

impl RecordingApplier {
    pub fn batches(&self) -> Vec<Vec<ServerUpdate>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpdateApplier for RecordingApplier {
    async fn apply_server_updates(&self, updates: &[ServerUpdate]) -> SyncResult<()> {
        self.batches.lock().unwrap().push(updates.to_vec());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Storage("projection write failed".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmitter {
    snapshots: AtomicUsize,
    errors: AtomicUsize,
    last: Mutex<Option<SyncSnapshot>>,
}

impl RecordingEmitter {
    pub fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<SyncSnapshot> {
        self.last.lock().unwrap().clone()
    }
}

impl SyncEventEmitter for RecordingEmitter {
    fn emit_snapshot(&self, snapshot: &SyncSnapshot) {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(snapshot.clone());
    }

    fn emit_error(&self, _message: &str, _retryable: bool) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Failing Store
// =============================================================================

/// Wraps the backing store and can be told to refuse every write.
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    fn new(inner: Arc<MemoryStore>) -> Self {
        FlakyStore {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> DbResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::QueryFailed("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for FlakyStore {
    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> DbResult<()> {
        self.check_write()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> DbResult<()> {
        self.check_write()?;
        self.inner.remove(key).await
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub engine: SyncEngine,
    pub backing: Arc<MemoryStore>,
    /// The store the engine writes through.
    pub store: Arc<FlakyStore>,
    pub transport: Arc<FakeTransport>,
    pub applier: Arc<RecordingApplier>,
    pub emitter: Arc<RecordingEmitter>,
    settings: SyncSettings,
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Engine over an empty store with no runtime context.
    pub async fn new() -> Self {
        Self::builder().build().await
    }

    /// Engine with the default test context already applied.
    pub async fn with_context() -> Self {
        let harness = Self::new().await;
        harness
            .engine
            .set_context(context())
            .await
            .expect("set test context");
        harness
    }

    /// A second engine over the same backing store, as after a restart.
    pub async fn reopen(&self) -> SyncEngine {
        SyncEngine::builder(
            self.settings.clone(),
            self.backing.clone(),
            Arc::new(FakeTransport::default()),
        )
        .build()
        .await
        .expect("reopen engine")
    }
}

#[derive(Default)]
pub struct HarnessBuilder {
    settings: SyncSettings,
    stored_cursor: Option<i64>,
}

impl HarnessBuilder {
    pub fn cursor_policy(mut self, policy: CursorPolicy) -> Self {
        self.settings.cursor_policy = policy;
        self
    }

    /// Seeds the store with a cursor before the engine loads it.
    pub fn stored_cursor(mut self, cursor: i64) -> Self {
        self.stored_cursor = Some(cursor);
        self
    }

    pub async fn build(self) -> Harness {
        let backing = Arc::new(MemoryStore::new());
        if let Some(cursor) = self.stored_cursor {
            let store: Arc<dyn LocalStore> = backing.clone();
            SyncStore::new(store)
                .save_server_cursor(cursor)
                .await
                .expect("seed cursor");
        }

        let transport = Arc::new(FakeTransport::default());
        let applier = Arc::new(RecordingApplier::default());
        let emitter = Arc::new(RecordingEmitter::default());

        let store = Arc::new(FlakyStore::new(backing.clone()));
        let engine = SyncEngine::builder(self.settings.clone(), store.clone(), transport.clone())
            .applier(applier.clone())
            .emitter(emitter.clone())
            .build()
            .await
            .expect("build engine");

        Harness {
            engine,
            backing,
            store,
            transport,
            applier,
            emitter,
            settings: self.settings,
        }
    }
}
