//! Named fixed-interval triggers.
//!
//! Each trigger gets its own task. A trigger awaits its job before waiting for
//! the next tick, so a slow job never overlaps itself; ticks missed while it ran
//! are skipped rather than replayed in a burst.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Work driven by a [`Trigger`]
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Run once. Errors are logged by the scheduler and the trigger keeps going.
    async fn run(&self) -> anyhow::Result<()>;
}

pub struct Trigger {
    pub name: &'static str,
    pub period: Duration,
    pub job: Arc<dyn ScheduledJob>,
}

impl Trigger {
    pub fn new(name: &'static str, period: Duration, job: Arc<dyn ScheduledJob>) -> Self {
        Self { name, period, job }
    }
}

#[derive(Default)]
pub struct Scheduler {
    triggers: Vec<Trigger>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trigger(&mut self, trigger: Trigger) -> &mut Self {
        self.triggers.push(trigger);
        self
    }

    /// Cancelling this token stops every trigger once its in-flight job is done
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive all triggers until cancelled
    pub async fn run(self) {
        let mut tasks = JoinSet::new();

        for trigger in self.triggers {
            info!(
                "Starting trigger '{}' every {:?}",
                trigger.name, trigger.period
            );
            tasks.spawn(run_trigger(trigger, self.cancel.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("Trigger task ended abnormally: {}", e);
            }
        }

        info!("All triggers stopped");
    }
}

async fn run_trigger(trigger: Trigger, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(trigger.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // Not raced against cancellation: a started job always completes
        if let Err(e) = trigger.job.run().await {
            warn!("Job '{}' failed: {:#}", trigger.name, e);
            metrics::counter!("scheduler.job_failures_total", "trigger" => trigger.name)
                .increment(1);
        }
    }

    debug!("Trigger '{}' stopped", trigger.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        work: Duration,
        fail: bool,
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        async fn run(&self) -> anyhow::Result<()> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);

            if self.fail {
                anyhow::bail!("simulated failure");
            }
            Ok(())
        }
    }

    struct SlowJob {
        started: AtomicBool,
        finished: AtomicBool,
    }

    #[async_trait]
    impl ScheduledJob for SlowJob {
        async fn run(&self) -> anyhow::Result<()> {
            self.started.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(150)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trigger_runs_repeatedly() {
        let job = Arc::new(CountingJob::default());
        let mut scheduler = Scheduler::new();
        scheduler.add_trigger(Trigger::new("count", Duration::from_millis(10), job.clone()));

        let cancel = scheduler.cancellation_token();
        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_slow_job_never_overlaps_itself() {
        let job = Arc::new(CountingJob {
            work: Duration::from_millis(30),
            ..Default::default()
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_trigger(Trigger::new("slow", Duration::from_millis(5), job.clone()));

        let cancel = scheduler.cancellation_token();
        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(job.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_job_keeps_its_trigger_alive() {
        let job = Arc::new(CountingJob {
            fail: true,
            ..Default::default()
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_trigger(Trigger::new("failing", Duration::from_millis(10), job.clone()));

        let cancel = scheduler.cancellation_token();
        let handle = tokio::spawn(scheduler.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(job.runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_cancellation_lets_in_flight_job_finish() {
        let job = Arc::new(SlowJob {
            started: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });
        let mut scheduler = Scheduler::new();
        scheduler.add_trigger(Trigger::new("slow", Duration::from_secs(60), job.clone()));

        let cancel = scheduler.cancellation_token();
        let handle = tokio::spawn(scheduler.run());

        // The first tick fires immediately
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(job.started.load(Ordering::SeqCst));
        cancel.cancel();
        handle.await.unwrap();

        assert!(job.finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_scheduler_with_no_triggers_returns() {
        let scheduler = Scheduler::new();
        scheduler.cancellation_token().cancel();
        scheduler.run().await;
    }
}
