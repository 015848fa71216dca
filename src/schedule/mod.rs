//! Fixed-interval cycle schedule.
//!
//! Runs one cycle immediately, then waits the check interval between the end
//! of one cycle and the start of the next. Cycles never overlap because the
//! next wait only starts once a cycle has returned.
//!
//! Cancelling the shutdown token stops the loop at the next wait. A cycle in
//! progress runs to completion.

use std::fmt;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::BotConfig;
use crate::cycle::CycleRunner;
use crate::effects::FeedInterpreter;
use crate::ledger::Ledger;

/// Default time between cycles (10 minutes).
const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;

/// Timing of the cycle loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Pause between the end of a cycle and the start of the next.
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            interval: Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS),
        }
    }
}

impl ScheduleConfig {
    pub fn from_config(config: &BotConfig) -> Self {
        ScheduleConfig {
            interval: config.check_interval(),
        }
    }
}

/// Runs cycles until `shutdown` is cancelled. Returns the number of cycles run.
pub async fn run_schedule<F, L>(
    runner: &mut CycleRunner<'_, F, L>,
    config: &ScheduleConfig,
    shutdown: CancellationToken,
) -> u64
where
    F: FeedInterpreter,
    F::Error: fmt::Display,
    L: Ledger,
{
    info!(
        interval_secs = config.interval.as_secs(),
        "Bot scheduled to run every {} minutes",
        config.interval.as_secs() / 60
    );

    let mut cycles = 0;
    let mut actions = 0;
    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown signal received, stopping");
            break;
        }

        actions += runner.run_cycle().await.total();
        cycles += 1;

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown signal received, stopping");
                break;
            }
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    info!(cycles, actions, "Schedule stopped");
    cycles
}
