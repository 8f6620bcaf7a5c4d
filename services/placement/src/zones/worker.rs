//! Zone assignment background worker.
//!
//! Runs a reconciliation pass on a periodic interval and whenever triggered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tracing::{error, info, instrument};

use super::reconciler::{ZoneAssignmentReconciler, ZoneAssignmentStats};
use crate::store::DocumentStore;

/// Requests an immediate pass. Triggers arriving during a pass coalesce into
/// one follow-up pass.
#[derive(Debug, Clone)]
pub struct ZoneAssignmentTrigger {
    notify: Arc<Notify>,
}

impl ZoneAssignmentTrigger {
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

/// Worker that runs the zone assignment loop.
pub struct ZoneAssignmentWorker {
    reconciler: ZoneAssignmentReconciler,
    interval: Duration,
    notify: Arc<Notify>,
    last_pass: watch::Sender<Option<ZoneAssignmentStats>>,
}

impl ZoneAssignmentWorker {
    pub fn new(store: Arc<dyn DocumentStore>, interval: Duration) -> Self {
        Self {
            reconciler: ZoneAssignmentReconciler::new(store),
            interval,
            notify: Arc::new(Notify::new()),
            last_pass: watch::Sender::new(None),
        }
    }

    pub fn trigger(&self) -> ZoneAssignmentTrigger {
        ZoneAssignmentTrigger {
            notify: Arc::clone(&self.notify),
        }
    }

    /// Stats of the most recent successful pass.
    pub fn subscribe(&self) -> watch::Receiver<Option<ZoneAssignmentStats>> {
        self.last_pass.subscribe()
    }

    /// Run the worker until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting zone assignment worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_pass("interval").await,
                _ = self.notify.notified() => self.run_pass("trigger").await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Zone assignment worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_pass(&self, reason: &'static str) {
        match self.reconciler.reconcile().await {
            Ok(stats) => {
                if stats.assigned > 0 || stats.conflicts > 0 || !stats.failures.is_empty() {
                    info!(
                        reason,
                        assigned = stats.assigned,
                        conflicts = stats.conflicts,
                        failures = stats.failures.len(),
                        "Zone assignment changed computes"
                    );
                }
                self.last_pass.send_replace(Some(stats));
            }
            Err(e) => error!(reason, error = %e, "Zone assignment pass failed"),
        }
    }
}
