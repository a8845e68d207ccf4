//! The periodic tick loop.
//!
//! [`run_market`] drives the engine against the store on a fixed
//! interval. Ticks never overlap: the next interval tick is awaited only
//! after the previous tick (including its commit) has finished, and
//! missed intervals are delayed rather than bursted.
//!
//! Commits can be debounced with `commit_every_ticks`; a value of `1`
//! persists after every tick.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::engine::TrendEngine;
use crate::random::RandomSource;
use crate::store::{CommitOutcome, SnapshotStore, TickReport};

/// Loop settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Time between ticks.
    pub tick_interval: Duration,
    /// Persist every N ticks. `0` is treated as `1`.
    pub commit_every_ticks: u64,
    /// Stop after this many ticks. `0` runs forever.
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            commit_every_ticks: 1,
            max_ticks: 0,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Ticks executed.
    pub total_ticks: u64,
    /// Commits that failed.
    pub failed_commits: u64,
}

/// Callback invoked after each tick.
///
/// Used to push tick summaries to observers.
pub trait TickCallback: Send {
    /// Called after a tick (and its commit, if any) completes.
    fn on_tick(&mut self, report: &TickReport);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport) {}
}

/// Run the tick loop until `max_ticks` is reached, or forever.
///
/// The first tick fires one interval after the call, matching a
/// periodic timer started at process launch.
pub async fn run_market<R: RandomSource>(
    store: &SnapshotStore,
    engine: &mut TrendEngine<R>,
    config: &RunConfig,
    callback: &mut dyn TickCallback,
) -> RunResult {
    let period = config.tick_interval.max(Duration::from_millis(1));
    let commit_every = config.commit_every_ticks.max(1);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    info!(
        tick_interval_ms = period.as_millis(),
        commit_every,
        max_ticks = config.max_ticks,
        "Market ticking"
    );

    let mut result = RunResult::default();

    loop {
        interval.tick().await;

        let next = result.total_ticks.saturating_add(1);
        let commit = next.checked_rem(commit_every) == Some(0);
        let report = store.advance(engine, commit).await;

        result.total_ticks = next;
        if report.commit == CommitOutcome::Failed {
            result.failed_commits = result.failed_commits.saturating_add(1);
        }

        callback.on_tick(&report);

        if config.max_ticks > 0 && result.total_ticks >= config.max_ticks {
            info!(
                total_ticks = result.total_ticks,
                failed_commits = result.failed_commits,
                "Tick limit reached"
            );
            return result;
        }
    }
}
