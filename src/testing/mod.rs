//! Testing utilities for users of the tock library.
//!
//! This module provides helpers for testing scheduled jobs and the engine:
//!
//! - [`ManualClock`]: A clock that only moves when told to
//! - [`RecordingJob`]: A job that records every tick it runs for
//! - [`FailingJob`]: A job whose predicate or body always fails
//! - [`PanickingJob`]: A job whose body panics
//! - [`BlockingJob`]: A job that stays in flight until released or interrupted
//! - [`RecordingProvider`]: An execution-context provider that records calls
//! - [`tick_at`]: Builds a UTC tick for a calendar minute

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::job::{JobContext, JobError, SchedulerJob};
use crate::core::tick::{TickSignal, TickUnit};
use crate::core::types::JobKey;
use crate::scheduler::{Clock, ExecutionContextProvider};

/// Build a UTC tick for the given calendar minute.
///
/// # Panics
///
/// Panics if the date is invalid.
///
/// # Example
///
/// ```
/// use tock::TickUnit;
/// use tock::testing::tick_at;
///
/// let tick = tick_at(2024, 12, 31, 23, 59, TickUnit::Minute);
/// assert_eq!(tick.day_of_month_reverse(), 1);
/// ```
pub fn tick_at(year: i32, month: u32, day: u32, hour: u32, minute: u32, unit: TickUnit) -> TickSignal {
    let timestamp = Utc
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid tick date {year}-{month}-{day} {hour}:{minute}"));
    TickSignal::from_utc(timestamp, unit)
}

/// A clock that only moves when set or advanced.
///
/// Pair it with `#[tokio::test(start_paused = true)]` to drive the ticker
/// through arbitrary wall-clock scenarios, including backward jumps.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock reading `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Set the current time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the current time by `delta`, which may be negative.
    pub fn advance(&self, delta: chrono::TimeDelta) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}

type Predicate = Box<dyn Fn(&TickSignal) -> bool + Send + Sync>;

/// A job that records the ticks it ran for.
///
/// Due on every tick unless a predicate is set.
pub struct RecordingJob {
    key: JobKey,
    predicate: Predicate,
    dispose_after: Option<usize>,
    due_checks: AtomicUsize,
    runs: AtomicUsize,
    ticks: Mutex<Vec<TickSignal>>,
}

impl RecordingJob {
    pub fn new(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            key: JobKey::new(group_id, job_id),
            predicate: Box::new(|_| true),
            dispose_after: None,
            due_checks: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
            ticks: Mutex::new(Vec::new()),
        }
    }

    /// Replace the due predicate.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TickSignal) -> bool + Send + Sync + 'static,
    {
        self.predicate = Box::new(predicate);
        self
    }

    /// Report the job as disposed once it has run `runs` times.
    pub fn dispose_after(mut self, runs: usize) -> Self {
        self.dispose_after = Some(runs);
        self
    }

    /// Number of times the predicate was asked.
    pub fn due_checks(&self) -> usize {
        self.due_checks.load(Ordering::SeqCst)
    }

    /// Number of completed runs.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Ticks of the completed runs, in completion order.
    pub fn ticks(&self) -> Vec<TickSignal> {
        self.ticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SchedulerJob for RecordingJob {
    fn group_id(&self) -> &str {
        self.key.group_id()
    }

    fn job_id(&self) -> &str {
        self.key.job_id()
    }

    fn is_due(&self, tick: &TickSignal) -> Result<bool, JobError> {
        self.due_checks.fetch_add(1, Ordering::SeqCst);
        Ok((self.predicate)(tick))
    }

    async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
        self.ticks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ctx.tick().clone());
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_disposed(&self) -> bool {
        self.dispose_after
            .is_some_and(|limit| self.run_count() >= limit)
    }
}

/// A job that fails either its due check or its body.
pub struct FailingJob {
    key: JobKey,
    fail_predicate: bool,
    runs: AtomicUsize,
}

impl FailingJob {
    /// A job whose due check always returns an error.
    pub fn failing_predicate(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            key: JobKey::new(group_id, job_id),
            fail_predicate: true,
            runs: AtomicUsize::new(0),
        }
    }

    /// A job that is always due and whose body always returns an error.
    pub fn failing_run(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            key: JobKey::new(group_id, job_id),
            fail_predicate: false,
            runs: AtomicUsize::new(0),
        }
    }

    /// Number of attempted runs.
    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerJob for FailingJob {
    fn group_id(&self) -> &str {
        self.key.group_id()
    }

    fn job_id(&self) -> &str {
        self.key.job_id()
    }

    fn is_due(&self, _tick: &TickSignal) -> Result<bool, JobError> {
        if self.fail_predicate {
            return Err(JobError::Predicate("injected predicate failure".into()));
        }
        Ok(true)
    }

    async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Err(JobError::Failed("injected failure".into()))
    }
}

/// A job that is always due and panics when run.
pub struct PanickingJob {
    key: JobKey,
}

impl PanickingJob {
    pub fn new(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            key: JobKey::new(group_id, job_id),
        }
    }
}

#[async_trait]
impl SchedulerJob for PanickingJob {
    fn group_id(&self) -> &str {
        self.key.group_id()
    }

    fn job_id(&self) -> &str {
        self.key.job_id()
    }

    fn is_due(&self, _tick: &TickSignal) -> Result<bool, JobError> {
        Ok(true)
    }

    async fn run(&self, _ctx: JobContext) -> Result<(), JobError> {
        panic!("injected panic in job body");
    }
}

/// A job that is always due and stays in flight until released.
///
/// By default it also returns [`JobError::Interrupted`] as soon as an
/// interrupt is requested; [`BlockingJob::ignoring_interrupts`] builds one
/// that only stops on [`release`](BlockingJob::release).
pub struct BlockingJob {
    key: JobKey,
    honours_interrupts: bool,
    single_flight: bool,
    release: CancellationToken,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl BlockingJob {
    pub fn new(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            key: JobKey::new(group_id, job_id),
            honours_interrupts: true,
            single_flight: false,
            release: CancellationToken::new(),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn ignoring_interrupts(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            honours_interrupts: false,
            ..Self::new(group_id, job_id)
        }
    }

    /// Disallow overlapping runs.
    pub fn single_flight(mut self) -> Self {
        self.single_flight = true;
        self
    }

    /// Let every current and future run finish.
    pub fn release(&self) {
        self.release.cancel();
    }

    /// Number of runs that have started.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of runs that have returned.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulerJob for BlockingJob {
    fn group_id(&self) -> &str {
        self.key.group_id()
    }

    fn job_id(&self) -> &str {
        self.key.job_id()
    }

    fn is_due(&self, _tick: &TickSignal) -> Result<bool, JobError> {
        Ok(true)
    }

    async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
        self.started.fetch_add(1, Ordering::SeqCst);

        let result = if self.honours_interrupts {
            tokio::select! {
                _ = self.release.cancelled() => Ok(()),
                _ = ctx.interrupted() => Err(JobError::Interrupted),
            }
        } else {
            self.release.cancelled().await;
            Ok(())
        };

        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }

    fn allows_overlap(&self) -> bool {
        !self.single_flight
    }
}

/// Execution-context provider that records which jobs it ran.
#[derive(Default)]
pub struct RecordingProvider {
    executed: Mutex<Vec<JobKey>>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys of the jobs handed to the provider, in call order.
    pub fn executed(&self) -> Vec<JobKey> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ExecutionContextProvider for RecordingProvider {
    async fn handle_job_execution(
        &self,
        job: Arc<dyn SchedulerJob>,
        ctx: JobContext,
    ) -> Result<(), JobError> {
        self.executed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.key());
        job.run(ctx).await
    }
}
