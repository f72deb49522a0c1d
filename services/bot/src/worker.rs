//! Periodic worker driving reconciliation passes.
//!
//! The worker:
//! - Waits one check interval, or until shutdown is signalled
//! - Runs a single reconciliation pass
//! - Survives a panicking pass and logs it with the tracking state
//! - Clears all tracking when it exits

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::reconciler::IdleReconciler;
use crate::tracking::TrackingStore;

/// Worker for one running mover instance.
pub struct MoverWorker {
    reconciler: IdleReconciler,
    tracking: Arc<TrackingStore>,
    interval: Duration,
}

impl MoverWorker {
    pub fn new(reconciler: IdleReconciler, tracking: Arc<TrackingStore>, interval: Duration) -> Self {
        Self {
            reconciler,
            tracking,
            interval,
        }
    }

    /// Run until shutdown is signalled or the sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            idle_threshold_secs = self.reconciler.policy().threshold.as_secs_f64(),
            "Idle mover started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first pass runs one
        // interval after start.
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        let dropped = self.tracking.clear().await;
        warn!(dropped_entries = dropped, "Idle mover stopped");
    }

    async fn tick(&self) {
        match AssertUnwindSafe(self.reconciler.reconcile())
            .catch_unwind()
            .await
        {
            Ok(report) => report.log(),
            Err(panic) => {
                let tracked = self.tracking.snapshot().await;
                error!(
                    panic = panic_message(panic.as_ref()),
                    tracked = ?tracked,
                    "Reconciliation pass panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
