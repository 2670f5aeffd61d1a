//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Driving the ticker loop on its own tokio task
//! - Evaluating every registered job against each tick
//! - Dispatching due jobs through the execution-context provider
//! - Tracking and interrupting in-flight executions
//! - Activation toggling without stopping the ticker

use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::control::SchedulerControl;
use super::dispatch::Dispatcher;
use super::evaluator;
use super::provider::{DirectExecution, ExecutionContextProvider};
use super::registry::JobRegistry;
use super::ticker::{Clock, SystemClock, Ticker};
use super::tracker::{RunningJob, RunningJobTracker};
use super::types::{SchedulerError, SchedulerState, TickReport};
use crate::config::{ConfigError, SchedulerConfig};
use crate::core::job::SchedulerJob;
use crate::core::tick::{TickSignal, TickUnit};
use crate::events::{Event, EventBus};

/// Builder for configuring a [`Scheduler`].
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    provider: Arc<dyn ExecutionContextProvider>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
}

impl SchedulerBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            provider: Arc::new(DirectExecution),
            event_bus: Arc::new(EventBus::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tick granularity.
    pub fn with_tick_unit(mut self, unit: TickUnit) -> Self {
        self.config.tick_unit = unit;
        self
    }

    /// Set the IANA timezone ticks are aligned in.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.config.timezone = timezone.into();
        self
    }

    /// Set the execution-context provider.
    pub fn with_provider(mut self, provider: Arc<dyn ExecutionContextProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the clock the ticker reads.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the configuration and build the scheduler.
    pub fn build(self) -> Result<Scheduler, ConfigError> {
        self.config.validate()?;
        let timezone = self.config.parsed_timezone()?;
        Ok(Scheduler::from_parts(
            self.config,
            timezone,
            self.provider,
            self.event_bus,
            self.clock,
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The running ticker task and its stop signal.
struct TickerLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct SchedulerInner {
    config: SchedulerConfig,
    timezone: Tz,
    registry: Arc<JobRegistry>,
    tracker: Arc<RunningJobTracker>,
    dispatcher: Dispatcher,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    active: AtomicBool,
    ticker_loop: Mutex<Option<TickerLoop>>,
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        let slot = self
            .ticker_loop
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker_loop) = slot.take() {
            ticker_loop.cancel.cancel();
        }
    }
}

/// The scheduling engine.
///
/// `Scheduler` is a cheap-to-clone handle; clones share the same registry,
/// running-job set and ticker loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    /// Create a scheduler with the default configuration: minute ticks in
    /// UTC, coalescing overruns, jobs run directly.
    pub fn new() -> Self {
        Self::from_parts(
            SchedulerConfig::default(),
            Tz::UTC,
            Arc::new(DirectExecution),
            Arc::new(EventBus::new()),
            Arc::new(SystemClock),
        )
    }

    /// Start configuring a scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    fn from_parts(
        config: SchedulerConfig,
        timezone: Tz,
        provider: Arc<dyn ExecutionContextProvider>,
        event_bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let tracker = Arc::new(RunningJobTracker::new());
        let dispatcher = Dispatcher {
            registry: Arc::clone(&registry),
            tracker: Arc::clone(&tracker),
            provider,
            event_bus: Arc::clone(&event_bus),
        };

        Self {
            inner: Arc::new(SchedulerInner {
                active: AtomicBool::new(config.start_active),
                config,
                timezone,
                registry,
                tracker,
                dispatcher,
                event_bus,
                clock,
                ticker_loop: Mutex::new(None),
            }),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    /// Get the state of the ticker loop.
    pub fn state(&self) -> SchedulerState {
        if self.is_running() {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// This scheduler as a shared control handle.
    pub fn control(&self) -> Arc<dyn SchedulerControl> {
        Arc::new(self.clone())
    }

    /// Run one evaluation pass for `tick`.
    ///
    /// The ticker loop calls this for every tick; owners may also call it to
    /// drive the engine by hand. Dispatched jobs run on their own tasks, so
    /// this returns as soon as every due job has been handed off.
    pub async fn process_tick(&self, tick: &TickSignal) -> TickReport {
        let jobs = self.inner.registry.snapshot();
        let due = evaluator::due_jobs(&jobs, tick);

        let mut report = TickReport {
            evaluated: jobs.len(),
            due: due.len(),
            ..TickReport::default()
        };

        for job in due {
            if !self.is_active() {
                report.skipped_inactive += 1;
                continue;
            }

            if !job.allows_overlap() && self.inner.tracker.is_running(&job) {
                tracing::debug!(
                    group_id = job.group_id(),
                    job_id = job.job_id(),
                    tick = %tick,
                    "Skipping single-flight job, previous run still in flight"
                );
                report.skipped_overlap += 1;
                continue;
            }

            let running = self.inner.dispatcher.dispatch(job, tick, self.control());
            tracing::debug!(
                group_id = running.key().group_id(),
                job_id = running.key().job_id(),
                run_id = %running.run_id(),
                tick = %tick,
                "Dispatched job"
            );
            report.dispatched.push(running.run_id());
        }

        if report.skipped_inactive > 0 {
            tracing::debug!(
                tick = %tick,
                skipped = report.skipped_inactive,
                "Scheduler inactive, due jobs not dispatched"
            );
        }

        self.inner
            .event_bus
            .emit(Event::tick_processed(
                tick.utc(),
                report.due,
                report.dispatched.len(),
            ))
            .await;

        report
    }

    /// Stop the ticker loop and wait for it to exit.
    ///
    /// Like [`stop`](SchedulerControl::stop), in-flight executions are left
    /// running.
    pub async fn shutdown(&self) {
        let Some(ticker_loop) = self.take_ticker_loop() else {
            return;
        };
        ticker_loop.cancel.cancel();
        if let Err(e) = ticker_loop.handle.await {
            tracing::warn!(error = %e, "Ticker loop ended abnormally");
        }
        tracing::info!(
            running_jobs = self.inner.tracker.len(),
            "Scheduler shut down"
        );
    }

    fn take_ticker_loop(&self) -> Option<TickerLoop> {
        self.inner
            .ticker_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .field("active", &self.is_active())
            .field("jobs", &self.inner.registry.len())
            .field("running_jobs", &self.inner.tracker.len())
            .finish()
    }
}

/// Main ticker loop. Holds the engine weakly so that dropping every
/// [`Scheduler`] handle ends the loop.
async fn run_ticker_loop(
    inner: Weak<SchedulerInner>,
    mut ticker: Ticker,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) {
    loop {
        let tick = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            tick = ticker.next_tick(clock.as_ref()) => tick,
        };

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let scheduler = Scheduler { inner };

        tracing::debug!(tick = %tick, "Processing tick");
        scheduler.process_tick(&tick).await;
    }

    tracing::debug!("Ticker loop exited");
}

impl SchedulerControl for Scheduler {
    fn start(&self) -> Result<(), SchedulerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let mut slot = self
            .inner
            .ticker_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|ticker_loop| !ticker_loop.handle.is_finished())
        {
            tracing::debug!("Scheduler already running");
            return Ok(());
        }

        let config = &self.inner.config;
        let ticker = Ticker::new(config.tick_unit, self.inner.timezone)
            .with_overrun_policy(config.overrun_policy, config.max_backlog);
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_ticker_loop(
            Arc::downgrade(&self.inner),
            ticker,
            Arc::clone(&self.inner.clock),
            cancel.clone(),
        ));
        *slot = Some(TickerLoop { cancel, handle });

        tracing::info!(
            tick_unit = %config.tick_unit,
            timezone = %self.inner.timezone,
            overrun_policy = ?config.overrun_policy,
            "Scheduler started"
        );
        Ok(())
    }

    fn stop(&self) {
        if let Some(ticker_loop) = self.take_ticker_loop() {
            ticker_loop.cancel.cancel();
            tracing::info!(
                running_jobs = self.inner.tracker.len(),
                "Scheduler stopped"
            );
        }
    }

    fn is_running(&self) -> bool {
        self.inner
            .ticker_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|ticker_loop| !ticker_loop.handle.is_finished())
    }

    fn set_active(&self, active: bool) {
        let previous = self.inner.active.swap(active, Ordering::SeqCst);
        if previous != active {
            tracing::info!(active, "Scheduler dispatch toggled");
        }
    }

    fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    fn add_job(&self, job: Arc<dyn SchedulerJob>) {
        tracing::debug!(
            group_id = job.group_id(),
            job_id = job.job_id(),
            "Registered job"
        );
        self.inner.registry.add(job);
    }

    fn remove_jobs(
        &self,
        group_id: Option<&str>,
        job_id: Option<&str>,
    ) -> Vec<Arc<dyn SchedulerJob>> {
        let removed = self.inner.registry.remove_matching(group_id, job_id);
        if !removed.is_empty() {
            tracing::debug!(
                group_id = group_id.unwrap_or("*"),
                job_id = job_id.unwrap_or("*"),
                removed = removed.len(),
                "Removed jobs"
            );
        }
        removed
    }

    fn remove_all_jobs(&self) {
        self.inner.registry.clear();
    }

    fn get_job(&self, job_id: &str) -> Option<Arc<dyn SchedulerJob>> {
        self.inner.registry.find_by_job_id(job_id)
    }

    fn get_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<Arc<dyn SchedulerJob>> {
        self.inner.registry.matching(group_id, job_id)
    }

    fn all_jobs(&self) -> Vec<Arc<dyn SchedulerJob>> {
        self.inner.registry.snapshot()
    }

    fn job_count(&self) -> usize {
        self.inner.registry.len()
    }

    fn running_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        self.inner.tracker.matching(group_id, job_id)
    }

    fn all_running_jobs(&self) -> Vec<RunningJob> {
        self.inner.tracker.snapshot()
    }

    fn running_job_count(&self) -> usize {
        self.inner.tracker.len()
    }

    fn interrupt_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        let signalled = self.inner.tracker.interrupt(group_id, job_id);
        for running in &signalled {
            tracing::info!(
                group_id = running.key().group_id(),
                job_id = running.key().job_id(),
                run_id = %running.run_id(),
                "Interrupt requested"
            );
        }
        signalled
    }
}
