//! Shutdown drain coordinator.
//!
//! Runs once when the process is told to terminate. With the master
//! switch off it returns at once. With graceful shutdown enabled it polls
//! the in-flight counter every check interval until it reaches zero or the
//! wait budget is spent; otherwise it sleeps for the configured wait.
//! Either way it always returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use grace_core::ShutdownConfig;

use crate::state::ShutdownState;

/// Poll interval used when the configured one is not positive.
const FALLBACK_CHECK_INTERVAL_SECS: i64 = 1;

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Grace handling is switched off; shutdown proceeds immediately.
    Disabled,
    /// Every in-flight request finished within the budget.
    Drained,
    /// The budget ran out with requests still in flight.
    Incomplete,
    /// The wait time was not positive, so nothing was waited for.
    Skipped,
    /// Graceful draining is off; slept for the fixed wait instead.
    FixedWait,
}

/// Result of a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// In-flight requests left when the drain returned.
    pub remaining: u64,
    /// Wall time spent waiting.
    pub waited: Duration,
}

/// Drives the bounded wait for in-flight requests on termination.
#[derive(Debug, Clone)]
pub struct DrainCoordinator {
    config: ShutdownConfig,
    state: Arc<ShutdownState>,
}

impl DrainCoordinator {
    pub fn new(config: ShutdownConfig, state: Arc<ShutdownState>) -> Self {
        Self { config, state }
    }

    /// Run the drain on its own task.
    pub fn spawn(self) -> JoinHandle<DrainReport> {
        tokio::spawn(async move { self.run().await })
    }

    /// Mark the process as shutting down and wait for in-flight requests.
    pub async fn run(&self) -> DrainReport {
        if !self.state.begin_shutdown() {
            debug!("shutdown already in progress, re-entering drain");
        }
        let started = Instant::now();

        if !self.config.enabled {
            debug!("grace disabled, not waiting for in-flight requests");
            return self.report(DrainOutcome::Disabled, started);
        }

        if !self.config.graceful {
            let wait = secs(self.config.wait_secs.max(0));
            info!(wait_secs = wait.as_secs(), "graceful drain disabled, waiting fixed time");
            tokio::time::sleep(wait).await;
            return self.report(DrainOutcome::FixedWait, started);
        }

        let mut budget = self.config.wait_secs;
        if budget <= 0 {
            warn!(wait_secs = budget, "invalid shutdown wait time, skipping drain");
            return self.report(DrainOutcome::Skipped, started);
        }

        let step = if self.config.check_interval_secs > 0 {
            self.config.check_interval_secs
        } else {
            warn!(
                check_interval_secs = self.config.check_interval_secs,
                fallback_secs = FALLBACK_CHECK_INTERVAL_SECS,
                "invalid shutdown check interval"
            );
            FALLBACK_CHECK_INTERVAL_SECS
        };

        let requests = self.state.requests();
        while requests.current() > 0 && budget > 0 {
            info!(remaining = requests.current(), "waiting for in-flight requests to complete");
            tokio::time::sleep(secs(step)).await;
            budget -= step;
        }

        let remaining = requests.current();
        if remaining > 0 {
            warn!(remaining, "shutdown wait expired with requests still in flight");
            self.report(DrainOutcome::Incomplete, started)
        } else {
            info!("graceful shutdown completed");
            self.report(DrainOutcome::Drained, started)
        }
    }

    fn report(&self, outcome: DrainOutcome, started: Instant) -> DrainReport {
        DrainReport {
            outcome,
            remaining: self.state.requests().current(),
            waited: started.elapsed(),
        }
    }
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}
