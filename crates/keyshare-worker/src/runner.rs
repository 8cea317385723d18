//! Sweep runner: drives reconciliation passes on a fixed interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use keyshare_auth::seat::{ReconciliationSweeper, SweepReport};
use keyshare_core::config::SweeperConfig;

/// Pass counters shared between the runner task and its handle.
#[derive(Debug, Default)]
struct SweepStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

/// Runs the reconciliation sweeper until cancelled.
///
/// The first pass runs immediately, then once per interval. A failed pass
/// is logged and skipped; the loop only ends on the cancel signal, and
/// never in the middle of a pass.
#[derive(Debug, Clone)]
pub struct SweepRunner {
    /// The sweeper to drive.
    sweeper: Arc<ReconciliationSweeper>,
    /// Time between pass starts.
    interval: Duration,
    /// Pass counters.
    stats: Arc<SweepStats>,
}

impl SweepRunner {
    /// Create a runner with the given interval.
    pub fn new(sweeper: Arc<ReconciliationSweeper>, interval: Duration) -> Self {
        Self {
            sweeper,
            interval,
            stats: Arc::new(SweepStats::default()),
        }
    }

    /// Create a runner from configuration.
    pub fn from_config(sweeper: Arc<ReconciliationSweeper>, config: &SweeperConfig) -> Self {
        Self::new(sweeper, config.interval())
    }

    /// Run one pass, logging instead of propagating failure.
    pub async fn tick(&self) -> Option<SweepReport> {
        match self.sweeper.run_pass().await {
            Ok(report) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                Some(report)
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_retryable() {
                    warn!(error = %e, "Sweep pass skipped, store unavailable");
                } else {
                    error!(error = %e, "Sweep pass failed");
                }
                None
            }
        }
    }

    /// Loop until `cancel` turns true.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        info!(interval_seconds = self.interval.as_secs(), "Sweeper started");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        info!(
            completed = self.completed_passes(),
            failed = self.failed_passes(),
            "Sweeper stopped"
        );
    }

    /// Spawn the loop onto the runtime.
    pub fn start(self) -> SweepHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let stats = Arc::clone(&self.stats);
        let task = tokio::spawn(async move { self.run(cancel_rx).await });
        SweepHandle {
            cancel: cancel_tx,
            task,
            stats,
        }
    }

    /// Passes that completed.
    pub fn completed_passes(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Passes that failed.
    pub fn failed_passes(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}

/// Owner of a running sweeper task.
#[derive(Debug)]
pub struct SweepHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
    stats: Arc<SweepStats>,
}

impl SweepHandle {
    /// Signal the loop and wait for it to finish any pass in progress.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Sweeper task did not shut down cleanly");
        }
    }

    /// Passes that completed so far.
    pub fn completed_passes(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Passes that failed so far.
    pub fn failed_passes(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}
