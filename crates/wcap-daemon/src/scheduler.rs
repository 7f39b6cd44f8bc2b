//! Continuous capture loop

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::orchestrator::CycleRunner;

pub const BASE_INTERVAL_SECS: i64 = 600;
pub const INTERVAL_JITTER_SECS: i64 = 30;
pub const MIN_INTERVAL_SECS: i64 = 60;

/// Sleep after a cycle: the base interval shifted by `jitter_secs`, never
/// below the floor
pub fn next_interval(jitter_secs: i64) -> Duration {
    let secs = (BASE_INTERVAL_SECS + jitter_secs).max(MIN_INTERVAL_SECS);
    Duration::from_secs(secs as u64)
}

/// Uniform jitter in `[-INTERVAL_JITTER_SECS, INTERVAL_JITTER_SECS]`
pub fn random_jitter() -> i64 {
    rand::thread_rng().gen_range(-INTERVAL_JITTER_SECS..=INTERVAL_JITTER_SECS)
}

/// Totals for one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub cycles: u64,
    /// Cycles that produced no artifact
    pub failed: u64,
    /// Cycles whose artifact could not be persisted
    pub unstored: u64,
}

/// Runs cycles back to back with a jittered sleep in between. Cycles never
/// overlap, and cancellation is only observed between cycles and while
/// sleeping.
pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    jitter: Box<dyn Fn() -> i64 + Send + Sync>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        Self {
            runner,
            jitter: Box::new(random_jitter),
        }
    }

    /// Replace the jitter source
    pub fn with_jitter(mut self, jitter: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.jitter = Box::new(jitter);
        self
    }

    /// Run until `token` is cancelled
    pub async fn run(&self, token: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        info!(
            base_secs = BASE_INTERVAL_SECS,
            jitter_secs = INTERVAL_JITTER_SECS,
            "Scheduler started"
        );

        while !token.is_cancelled() {
            stats.cycles += 1;
            match self.runner.run_cycle().await {
                Ok(report) if report.is_stored() => info!(
                    cycle = stats.cycles,
                    source = ?report.frame_source,
                    readings = report.readings.len(),
                    overlay = report.overlay_applied,
                    "Cycle complete"
                ),
                Ok(report) => {
                    stats.unstored += 1;
                    warn!(cycle = stats.cycles, error = ?report.stored.err(), "Cycle complete, capture not stored");
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(cycle = stats.cycles, error = %format!("{:#}", e), "Cycle failed");
                }
            }

            let pause = next_interval((self.jitter)());
            info!(secs = pause.as_secs(), "Next cycle scheduled");
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(cycles = stats.cycles, failed = stats.failed, "Scheduler stopped");
        stats
    }
}
