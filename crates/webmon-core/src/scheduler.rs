//! The watch scheduler: decides which watches are due, runs their checks
//! with bounded concurrency, records outcomes, and advances each watch's
//! schedule.
//!
//! Per-watch lifecycle: `Idle(due_at)` → claimed via an atomic
//! compare-and-set → `InFlight` → check completes (success or failure) →
//! schedule written back → `Idle(new due_at)`. The claim guarantees at most
//! one outstanding check per watch; a semaphore bounds concurrent checks
//! regardless of watch-set size.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::check::CheckService;
use crate::error::AppError;
use crate::schedule;
use crate::traits::{Extractor, Fetcher, Notifier, WatchStore};
use crate::watch::Watch;

/// Events emitted by the scheduler for monitoring/logging.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<'a> {
    Started {
        max_concurrent_checks: usize,
    },
    StaleChecksReleased {
        released: u64,
    },
    CycleCompleted {
        due: usize,
        dispatched: usize,
    },
    CheckStarted {
        watch_id: Uuid,
        url: &'a str,
    },
    CheckSucceeded {
        watch_id: Uuid,
        value_id: Uuid,
    },
    CheckFailed {
        watch_id: Uuid,
        error: &'a str,
    },
    /// The schedule write-back failed even after retries. The watch may be
    /// stuck in flight until the stale-claim sweep releases it.
    CheckStuck {
        watch_id: Uuid,
        error: &'a str,
    },
    NotifyFailed {
        watch_id: Uuid,
        error: &'a str,
    },
    ShuttingDown {
        outstanding: usize,
    },
    Stopped,
}

/// Trait for receiving scheduler events (decoupled logging).
pub trait SchedulerReporter: Send + Sync {
    fn report(&self, event: SchedulerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSchedulerReporter;

impl SchedulerReporter for TracingSchedulerReporter {
    fn report(&self, event: SchedulerEvent<'_>) {
        match event {
            SchedulerEvent::Started {
                max_concurrent_checks,
            } => {
                tracing::info!(%max_concurrent_checks, "Scheduler started");
            }
            SchedulerEvent::StaleChecksReleased { released } => {
                tracing::warn!(%released, "Released stale in-flight claims");
            }
            SchedulerEvent::CycleCompleted { due, dispatched } => {
                tracing::debug!(%due, %dispatched, "Scheduling cycle completed");
            }
            SchedulerEvent::CheckStarted { watch_id, url } => {
                tracing::info!(%watch_id, %url, "Checking watch");
            }
            SchedulerEvent::CheckSucceeded { watch_id, value_id } => {
                tracing::info!(%watch_id, %value_id, "Check succeeded");
            }
            SchedulerEvent::CheckFailed { watch_id, error } => {
                tracing::warn!(%watch_id, %error, "Check failed");
            }
            SchedulerEvent::CheckStuck { watch_id, error } => {
                tracing::error!(%watch_id, %error, "Schedule write-back exhausted retries");
            }
            SchedulerEvent::NotifyFailed { watch_id, error } => {
                tracing::warn!(%watch_id, %error, "Notification delivery failed");
            }
            SchedulerEvent::ShuttingDown { outstanding } => {
                tracing::info!(%outstanding, "Scheduler shutting down");
            }
            SchedulerEvent::Stopped => {
                tracing::info!("Scheduler stopped");
            }
        }
    }
}

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on checks running at the same time.
    pub max_concurrent_checks: usize,
    /// Delay between scheduling cycles.
    pub tick_interval: Duration,
    /// In-flight claims older than this are released by the startup sweep.
    pub stale_claim_after: Duration,
    /// Attempts for the schedule write-back before giving up on a check.
    pub write_retry_attempts: u32,
    /// First retry delay for the schedule write-back; doubles per attempt.
    pub write_retry_base_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 8,
            tick_interval: Duration::from_secs(5),
            stale_claim_after: Duration::from_secs(600),
            write_retry_attempts: 3,
            write_retry_base_delay: Duration::from_millis(200),
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrent_checks(mut self, n: usize) -> Self {
        self.max_concurrent_checks = n.max(1);
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_stale_claim_after(mut self, after: Duration) -> Self {
        self.stale_claim_after = after;
        self
    }
}

/// Scheduler that drives due watches through fetch+extract checks.
pub struct SchedulerService<S, F, E, N>
where
    S: WatchStore,
    F: Fetcher,
    E: Extractor,
    N: Notifier,
{
    store: S,
    checker: CheckService<F, E, S>,
    notifier: N,
    config: SchedulerConfig,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl<S, F, E, N> SchedulerService<S, F, E, N>
where
    S: WatchStore + 'static,
    F: Fetcher + 'static,
    E: Extractor + 'static,
    N: Notifier + 'static,
{
    pub fn new(store: S, fetcher: F, extractor: E, notifier: N, config: SchedulerConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));
        let checker = CheckService::new(fetcher, extractor, store.clone());
        Self {
            store,
            checker,
            notifier,
            config,
            limiter,
            tracker: TaskTracker::new(),
        }
    }

    /// Run the scheduling loop until cancellation, then drain outstanding
    /// checks.
    pub async fn run<R>(&self, cancel_token: CancellationToken, reporter: &R) -> Result<(), AppError>
    where
        R: SchedulerReporter + Clone + 'static,
    {
        reporter.report(SchedulerEvent::Started {
            max_concurrent_checks: self.config.max_concurrent_checks,
        });

        // Crash recovery: claims that never completed must not block their
        // watches forever.
        let cutoff = Utc::now()
            - TimeDelta::from_std(self.config.stale_claim_after).unwrap_or_else(|_| TimeDelta::zero());
        match self.store.release_stale_checks(cutoff).await {
            Ok(released) if released > 0 => {
                reporter.report(SchedulerEvent::StaleChecksReleased { released });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Stale claim sweep failed");
            }
        }

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_cycle(Utc::now(), reporter).await {
                tracing::error!(error = %e, "Scheduling cycle failed");
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.tick_interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        // Graceful shutdown: let in-flight checks finish and write back
        // their schedules. Fetch timeouts bound how long this takes.
        self.tracker.close();
        reporter.report(SchedulerEvent::ShuttingDown {
            outstanding: self.tracker.len(),
        });
        self.tracker.wait().await;
        reporter.report(SchedulerEvent::Stopped);

        Ok(())
    }

    /// One scheduling pass: claim every due watch and dispatch its check.
    /// Returns the number of checks dispatched.
    ///
    /// Dispatch never waits on an individual check; the concurrency limit is
    /// enforced inside the spawned unit of work, so a full pool only delays
    /// execution, not scheduling.
    pub async fn run_cycle<R>(&self, now: DateTime<Utc>, reporter: &R) -> Result<usize, AppError>
    where
        R: SchedulerReporter + Clone + 'static,
    {
        let due = self.store.get_due_watches(now).await?;
        let due_count = due.len();
        let mut dispatched = 0;

        for watch in due {
            if !schedule::period_is_valid(watch.period) {
                tracing::warn!(watch_id = %watch.id, "Skipping watch with non-positive period");
                continue;
            }

            // Atomic claim: loses cleanly if another cycle or another
            // scheduler instance got here first.
            if !self.store.try_mark_in_flight(watch.id).await? {
                continue;
            }
            dispatched += 1;

            let _ = self.tracker.spawn(execute_check(
                self.checker.clone(),
                self.store.clone(),
                self.notifier.clone(),
                self.config.clone(),
                Arc::clone(&self.limiter),
                watch,
                reporter.clone(),
            ));
        }

        reporter.report(SchedulerEvent::CycleCompleted {
            due: due_count,
            dispatched,
        });
        Ok(dispatched)
    }

    /// Wait for every dispatched check to complete. Intended for tests and
    /// embedders that drive `run_cycle` directly instead of `run`.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

/// One unit of work: run the check, then write the new schedule back and
/// release the claim. The write-back happens exactly once per unit of work,
/// on every exit path.
async fn execute_check<S, F, E, N, R>(
    checker: CheckService<F, E, S>,
    store: S,
    notifier: N,
    config: SchedulerConfig,
    limiter: Arc<Semaphore>,
    watch: Watch,
    reporter: R,
) where
    S: WatchStore,
    F: Fetcher,
    E: Extractor,
    N: Notifier,
    R: SchedulerReporter,
{
    // Queued tasks hold no permit and no socket; the semaphore is the
    // worker pool.
    let _permit = Arc::clone(&limiter).acquire_owned().await.ok();

    reporter.report(SchedulerEvent::CheckStarted {
        watch_id: watch.id,
        url: &watch.url,
    });

    let result = checker.run_check(&watch).await;

    let completed_at = Utc::now();
    let next_check = schedule::next_due(completed_at, watch.period);

    match &result {
        Ok(value) => {
            reporter.report(SchedulerEvent::CheckSucceeded {
                watch_id: watch.id,
                value_id: value.id,
            });
        }
        Err(e) => {
            reporter.report(SchedulerEvent::CheckFailed {
                watch_id: watch.id,
                error: &e.to_string(),
            });
        }
    }

    if let Err(e) = persist_schedule(&store, watch.id, next_check, &config).await {
        reporter.report(SchedulerEvent::CheckStuck {
            watch_id: watch.id,
            error: &e.to_string(),
        });
    }

    // Notification is best-effort and must never affect watch state.
    if watch.notify
        && let Ok(value) = &result
        && let Err(e) = notifier.notify(&watch, value).await
    {
        reporter.report(SchedulerEvent::NotifyFailed {
            watch_id: watch.id,
            error: &e.to_string(),
        });
    }
}

/// Advance the watch's schedule and release its claim, retrying with
/// exponential backoff. Losing this write risks a permanently in-flight
/// watch, which is why it gets retries when nothing else does.
async fn persist_schedule<S: WatchStore>(
    store: &S,
    watch_id: Uuid,
    next_check: DateTime<Utc>,
    config: &SchedulerConfig,
) -> Result<(), AppError> {
    let attempts = config.write_retry_attempts.max(1);
    let mut delay = config.write_retry_base_delay;
    let mut last_err = None;

    for attempt in 1..=attempts {
        let write = async {
            store.update_watch_schedule(watch_id, next_check).await?;
            store.clear_in_flight(watch_id).await
        };
        match write.await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::warn!(%watch_id, error = %e, attempt, "Schedule write-back failed");
                last_err = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::StorageError("schedule write-back failed".into())))
}
