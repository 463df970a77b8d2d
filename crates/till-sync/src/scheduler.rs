//! # Scheduler
//!
//! Runs push and pull on fixed intervals, one background task per lane.
//!
//! ## Lane State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            try_enter() ok                                               │
//! │   ┌──────┐ ─────────────────► ┌─────────┐                               │
//! │   │ Idle │                    │ Running │ ── try_enter() ──► None       │
//! │   └──────┘ ◄───────────────── └─────────┘    (second caller no-ops)     │
//! │            FlightGuard dropped                                          │
//! │            (return, error or unwind)                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Timing
//! ```text
//!   start ─┬─► push ──── 4000ms ────► push ──── 4000ms ────► push ...
//!          └─► pull ──── 4000ms ────► pull ──── 4000ms ────► pull ...
//! ```
//! The first tick of a tokio interval fires immediately, which gives the
//! "sync once on start" behaviour. Stopping a lane lets an in-flight run
//! finish; it only prevents new ticks.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::Shared;

// =============================================================================
// Single-Flight Lane
// =============================================================================

/// Single-flight flag for one direction (push or pull).
#[derive(Debug)]
pub struct Lane {
    name: &'static str,
    busy: AtomicBool,
}

impl Lane {
    pub fn new(name: &'static str) -> Self {
        Lane {
            name,
            busy: AtomicBool::new(false),
        }
    }

    /// Claims the lane, or returns `None` if a run is already in flight.
    pub fn try_enter(&self) -> Option<FlightGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { lane: self })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Releases the lane when dropped.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    lane: &'a Lane,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.lane.busy.store(false, Ordering::Release);
    }
}

// =============================================================================
// Background Scheduler
// =============================================================================

struct LaneTask {
    name: &'static str,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Handle to the two running lane tasks.
pub(crate) struct Scheduler {
    lanes: Vec<LaneTask>,
}

impl Scheduler {
    /// Spawns the push and pull loops.
    pub(crate) fn spawn(shared: Arc<Shared>) -> Self {
        let push_every = shared.settings.push_interval();
        let pull_every = shared.settings.pull_interval();

        let push_shared = shared.clone();
        let push = spawn_lane("push", push_every, move || {
            let shared = push_shared.clone();
            async move {
                shared.push_now().await;
            }
        });

        let pull = spawn_lane("pull", pull_every, move || {
            let shared = shared.clone();
            async move {
                shared.pull_now().await;
            }
        });

        Scheduler {
            lanes: vec![push, pull],
        }
    }

    /// Signals both lanes and waits for any in-flight run to finish.
    pub(crate) async fn stop(self) {
        for lane in self.lanes {
            // a closed channel means the task already exited
            let _ = lane.shutdown_tx.send(()).await;
            if let Err(e) = lane.handle.await {
                error!(lane = lane.name, error = %e, "Sync lane task failed");
            }
        }
    }
}

fn spawn_lane<F, Fut>(name: &'static str, period: Duration, run: F) -> LaneTask
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let handle = tokio::spawn(async move {
        info!(lane = name, period_ms = period.as_millis() as u64, "Sync lane starting");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    debug!(lane = name, "Scheduled run");
                    run().await;
                }

                _ = shutdown_rx.recv() => {
                    info!(lane = name, "Sync lane shutting down");
                    break;
                }
            }
        }

        info!(lane = name, "Sync lane stopped");
    });

    LaneTask {
        name,
        shutdown_tx,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lane_is_single_flight() {
        let lane = Lane::new("push");
        assert_eq!(lane.name(), "push");

        let first = lane.try_enter();
        assert!(first.is_some());
        assert!(lane.is_busy());
        assert!(lane.try_enter().is_none());

        drop(first);
        assert!(!lane.is_busy());
        assert!(lane.try_enter().is_some());
    }

    #[test]
    fn test_guard_released_on_unwind() {
        let lane = Lane::new("pull");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lane.try_enter().unwrap();
            panic!("pull blew up");
        }));

        assert!(result.is_err());
        assert!(!lane.is_busy());
    }
}
