//! # Pull Pipeline
//!
//! Fetches server changes since the stored cursor, page by page, and hands
//! them to the host application in one batch.
//!
//! ## Pull Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          pull_now()                                     │
//! │                                                                         │
//! │  cursor = stored cursor                                                │
//! │  loop:                                                                 │
//! │     POST /sync/pull { device_id, cursor, limit: 100 }                  │
//! │     updates += page.updates                                            │
//! │     cursor   = page.server_cursor                                      │
//! │     while page.has_more                                                │
//! │       │                                                                 │
//! │       │  any page fails ──► abort, stored cursor untouched             │
//! │       ▼                                                                 │
//! │  stored cursor = merge(stored, cursor); last_pull_success_at = now     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  applier.apply_server_updates(all updates)   (skipped when empty)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::engine::Shared;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{PullRequest, ServerUpdate};
use crate::push::SkipReason;

// =============================================================================
// Update Applier
// =============================================================================

/// Applies pulled server changes to local projections.
#[async_trait]
pub trait UpdateApplier: Send + Sync {
    /// Called once per completed pull with every update it fetched.
    async fn apply_server_updates(&self, updates: &[ServerUpdate]) -> SyncResult<()>;
}

/// Applier that drops updates.
pub struct NoOpApplier;

#[async_trait]
impl UpdateApplier for NoOpApplier {
    async fn apply_server_updates(&self, _updates: &[ServerUpdate]) -> SyncResult<()> {
        Ok(())
    }
}

// =============================================================================
// Pull
// =============================================================================

/// Result of one `pull_now` call.
#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    Skipped(SkipReason),
    Completed {
        pages: usize,
        updates: usize,
        server_cursor: i64,
    },
    /// A page failed; nothing was stored.
    Failed { pages: usize, error: String },
}

impl Shared {
    pub(crate) async fn pull_now(&self) -> PullOutcome {
        let device_id = match self.bound_device_id().await {
            Ok(id) => id,
            Err(_) => {
                debug!(lane = self.pull_lane.name(), "Pull skipped: sync disabled");
                return PullOutcome::Skipped(SkipReason::SyncDisabled);
            }
        };

        let Some(_flight) = self.pull_lane.try_enter() else {
            debug!(lane = self.pull_lane.name(), "Pull skipped: already in flight");
            return PullOutcome::Skipped(SkipReason::InFlight);
        };

        let start = self.state.read().await.server_cursor;
        let mut cursor = start;
        let mut updates: Vec<ServerUpdate> = Vec::new();
        let mut pages = 0usize;

        loop {
            let request = PullRequest {
                device_id: device_id.clone(),
                cursor,
                limit: self.settings.pull_limit,
            };

            let page = match self.transport.pull(&request).await {
                Ok(page) => page,
                Err(err) => return self.pull_failed(pages, err),
            };
            pages += 1;

            let progressed = !page.updates.is_empty() || page.server_cursor != cursor;
            updates.extend(page.updates);
            cursor = page.server_cursor;

            if !page.has_more {
                break;
            }
            if !progressed {
                let err = SyncError::MalformedResponse(format!(
                    "has_more without progress at cursor {cursor}"
                ));
                return self.pull_failed(pages, err);
            }
        }

        let stored = match self.commit_pull(cursor).await {
            Ok(stored) => stored,
            Err(err) => return self.pull_failed(pages, err),
        };

        info!(
            pages,
            updates = updates.len(),
            from = start,
            cursor = stored,
            "Pull completed"
        );

        if !updates.is_empty() {
            if let Err(e) = self.applier.apply_server_updates(&updates).await {
                warn!(error = %e, count = updates.len(), "Applying server updates failed");
                self.emitter.emit_error(&e.to_string(), false);
            }
        }

        self.emit().await;
        PullOutcome::Completed {
            pages,
            updates: updates.len(),
            server_cursor: stored,
        }
    }

    /// Stores the final cursor and the success timestamp.
    async fn commit_pull(&self, received: i64) -> SyncResult<i64> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let merged = self.settings.cursor_policy.merge(state.server_cursor, received);
        self.store.save_server_cursor(merged).await?;
        self.store.save_last_pull_success_at(now).await?;

        state.server_cursor = merged;
        state.last_pull_success_at = Some(now);
        Ok(merged)
    }

    fn pull_failed(&self, pages: usize, err: SyncError) -> PullOutcome {
        error!(error = %err, category = err.category(), pages, "Sync pull failed");
        self.emitter.emit_error(&err.to_string(), err.is_retryable());
        PullOutcome::Failed {
            pages,
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CursorPolicy;
    use crate::persist::keys;
    use crate::protocol::PullResponse;
    use crate::test_support::{context, update, Harness};
    use pretty_assertions::assert_eq;
    use till_db::LocalStore;

    fn page(updates: Vec<ServerUpdate>, server_cursor: i64, has_more: bool) -> PullResponse {
        PullResponse {
            updates,
            server_cursor,
            has_more,
        }
    }

    #[tokio::test]
    async fn test_two_pages_one_callback() {
        let harness = Harness::with_context().await;
        harness
            .transport
            .script_pull(Ok(page(vec![update(1), update(2)], 2, true)));
        harness.transport.script_pull(Ok(page(vec![update(3)], 3, false)));

        let outcome = harness.engine.pull_now().await;
        assert_eq!(
            outcome,
            PullOutcome::Completed {
                pages: 2,
                updates: 3,
                server_cursor: 3
            }
        );

        let requests = harness.transport.pull_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].cursor, 0);
        assert_eq!(requests[0].limit, 100);
        assert_eq!(requests[1].cursor, 2);

        let batches = harness.applier.batches();
        assert_eq!(batches.len(), 1);
        let cursors: Vec<i64> = batches[0].iter().map(|u| u.cursor).collect();
        assert_eq!(cursors, vec![1, 2, 3]);

        assert_eq!(harness.engine.server_cursor().await, 3);
        assert!(harness.engine.snapshot().await.last_pull_success_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_page_keeps_cursor() {
        let harness = Harness::with_context().await;
        harness.transport.script_pull(Ok(page(vec![update(5)], 5, true)));
        harness
            .transport
            .script_pull(Err(SyncError::Timeout("15s".into())));

        let outcome = harness.engine.pull_now().await;
        assert!(matches!(outcome, PullOutcome::Failed { pages: 1, .. }));

        assert_eq!(harness.engine.server_cursor().await, 0);
        assert!(harness.backing.get(keys::SERVER_CURSOR).await.unwrap().is_none());
        assert!(harness.applier.batches().is_empty());
        assert!(harness.engine.snapshot().await.last_pull_success_at.is_none());
    }

    #[tokio::test]
    async fn test_empty_pull_advances_without_callback() {
        let harness = Harness::with_context().await;
        harness.transport.script_pull(Ok(page(vec![], 8, false)));

        harness.engine.pull_now().await;

        assert_eq!(harness.engine.server_cursor().await, 8);
        assert!(harness.applier.batches().is_empty());
        assert!(harness.engine.snapshot().await.last_pull_success_at.is_some());
    }

    #[tokio::test]
    async fn test_cursor_never_regresses_across_pulls() {
        let harness = Harness::with_context().await;
        let mut seen = vec![harness.engine.server_cursor().await];

        for (cursor, more) in [(4, false), (4, false), (9, true), (11, false)] {
            harness.transport.script_pull(Ok(page(vec![], cursor, more)));
        }

        for _ in 0..3 {
            harness.engine.pull_now().await;
            seen.push(harness.engine.server_cursor().await);
        }

        assert_eq!(seen, vec![0, 4, 4, 11]);
        assert!(seen.windows(2).all(|w| w[1] >= w[0]));
    }

    #[tokio::test]
    async fn test_has_more_without_progress_aborts() {
        let harness = Harness::with_context().await;
        harness.transport.script_pull(Ok(page(vec![], 0, true)));

        let outcome = harness.engine.pull_now().await;
        assert!(matches!(outcome, PullOutcome::Failed { pages: 1, .. }));
        assert_eq!(harness.transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn test_applier_failure_is_swallowed() {
        let harness = Harness::with_context().await;
        harness.applier.fail_next();
        harness.transport.script_pull(Ok(page(vec![update(1)], 1, false)));

        let outcome = harness.engine.pull_now().await;
        assert!(matches!(outcome, PullOutcome::Completed { .. }));
        assert_eq!(harness.engine.server_cursor().await, 1);
        assert_eq!(harness.emitter.errors(), 1);
    }

    #[tokio::test]
    async fn test_max_policy_ignores_lower_cursor() {
        let harness = Harness::builder()
            .cursor_policy(CursorPolicy::Max)
            .stored_cursor(20)
            .build()
            .await;
        harness.engine.set_context(context()).await.unwrap();
        harness.transport.script_pull(Ok(page(vec![], 15, false)));

        harness.engine.pull_now().await;
        assert_eq!(harness.engine.server_cursor().await, 20);
    }

    #[tokio::test]
    async fn test_concurrent_pull_is_a_no_op() {
        let harness = Harness::with_context().await;
        let gate = harness.transport.hold_pulls();

        let engine = harness.engine.clone();
        let first = tokio::spawn(async move { engine.pull_now().await });
        gate.entered().await;

        assert_eq!(
            harness.engine.pull_now().await,
            PullOutcome::Skipped(SkipReason::InFlight)
        );
        gate.release();
        assert!(matches!(first.await.unwrap(), PullOutcome::Completed { .. }));
        assert_eq!(harness.transport.pull_count(), 1);
    }
}
