//! Periodic pipeline runs.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::RunStats;
use crate::config::ScheduleConfig;
use crate::error::PipelineError;

/// A unit of work the scheduler re-invokes on every tick.
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run_once(&self) -> Result<RunStats, PipelineError>;
}

/// Counters for a scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub runs: usize,
    pub failures: usize,
}

/// Runs a job on a fixed interval until shutdown.
///
/// There are no retries inside a run: a failed run is logged and the next
/// attempt happens at the next tick.
pub struct Scheduler<J> {
    job: J,
    interval: Duration,
    run_on_start: bool,
    shutdown: CancellationToken,
}

impl<J: ScheduledJob> Scheduler<J> {
    pub fn new(job: J, config: &ScheduleConfig, shutdown: CancellationToken) -> Self {
        Self {
            job,
            interval: config.interval(),
            run_on_start: config.run_on_start,
            shutdown,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(&self) -> ScheduleSummary {
        let mut summary = ScheduleSummary::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // The first tick completes immediately
        if !self.run_on_start {
            ticker.tick().await;
            info!("Waiting {}s before first run", self.interval.as_secs());
        }

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping scheduler");
                    break;
                }
                _ = ticker.tick() => {}
            }

            summary.runs += 1;
            match self.job.run_once().await {
                Ok(stats) => info!(
                    "Run {} complete: {} merged rows, {} tables written",
                    summary.runs, stats.merged_rows, stats.tables_written
                ),
                Err(e) => {
                    summary.failures += 1;
                    error!(
                        "Run {} failed, retrying in {}s: {}",
                        summary.runs,
                        self.interval.as_secs(),
                        snafu::Report::from_error(e)
                    );
                }
            }
        }

        info!(
            "Scheduler stopped after {} runs ({} failed)",
            summary.runs, summary.failures
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MergeError;
    use crate::source::SourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts runs, fails every other one and cancels after `limit`.
    struct CountingJob {
        runs: AtomicUsize,
        limit: usize,
        shutdown: CancellationToken,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        async fn run_once(&self) -> Result<RunStats, PipelineError> {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.limit {
                self.shutdown.cancel();
            }
            if n % 2 == 0 {
                return Err(PipelineError::Merge {
                    source: MergeError::EmptyInputs {
                        empty: vec![SourceKind::Payments],
                    },
                });
            }
            Ok(RunStats::default())
        }
    }

    fn scheduler(limit: usize, run_on_start: bool) -> Scheduler<CountingJob> {
        let shutdown = CancellationToken::new();
        let job = CountingJob {
            runs: AtomicUsize::new(0),
            limit,
            shutdown: shutdown.clone(),
        };
        let config = ScheduleConfig {
            interval_secs: 1,
            run_on_start,
        };
        Scheduler::new(job, &config, shutdown).with_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_runs_until_shutdown_and_survives_failures() {
        let scheduler = scheduler(4, true);
        let summary = scheduler.run().await;

        assert_eq!(summary, ScheduleSummary { runs: 4, failures: 2 });
        assert_eq!(scheduler.job.runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let scheduler = scheduler(10, false);
        scheduler.shutdown.cancel();

        let summary = scheduler.run().await;
        assert_eq!(summary.runs, 0);
    }

    #[tokio::test]
    async fn test_delayed_start_still_runs() {
        let scheduler = scheduler(1, false);
        let summary = scheduler.run().await;
        assert_eq!(summary, ScheduleSummary { runs: 1, failures: 0 });
    }
}
