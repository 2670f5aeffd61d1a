//! Job trait, execution context and error types.
//!
//! The `SchedulerJob` trait is what applications implement to register
//! recurring work with the engine. A job answers two questions: is it due for
//! a given tick, and what to do when it is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::tick::TickSignal;
use super::types::{JobKey, RunId};
use crate::scheduler::SchedulerControl;

/// Errors raised by job predicates and job bodies.
#[derive(Debug, Error)]
pub enum JobError {
    /// Job execution failed with a message.
    #[error("execution failed: {0}")]
    Failed(String),

    /// The job observed an interrupt and stopped early.
    #[error("job was interrupted")]
    Interrupted,

    /// The due predicate could not be evaluated.
    #[error("due check failed: {0}")]
    Predicate(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// A recurring unit of work registered with the scheduler.
///
/// # Example
///
/// ```ignore
/// use tock::{JobContext, JobError, SchedulerJob, TickSignal};
/// use async_trait::async_trait;
///
/// struct NightlyReport;
///
/// #[async_trait]
/// impl SchedulerJob for NightlyReport {
///     fn group_id(&self) -> &str {
///         "reports"
///     }
///
///     fn job_id(&self) -> &str {
///         "nightly"
///     }
///
///     fn is_due(&self, tick: &TickSignal) -> Result<bool, JobError> {
///         Ok(tick.hour() == 0 && tick.minute() == 0)
///     }
///
///     async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
///         if ctx.is_interrupted() {
///             return Err(JobError::Interrupted);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SchedulerJob: Send + Sync {
    /// Group part of the job address.
    fn group_id(&self) -> &str;

    /// Id part of the job address.
    fn job_id(&self) -> &str;

    /// Decide whether the job should fire for this tick.
    fn is_due(&self, tick: &TickSignal) -> Result<bool, JobError>;

    /// Execute the job body.
    ///
    /// Interruption is cooperative: long-running bodies should check
    /// [`JobContext::is_interrupted`] or await [`JobContext::interrupted`].
    async fn run(&self, ctx: JobContext) -> Result<(), JobError>;

    /// Whether a new firing may start while a previous one is still running.
    ///
    /// Defaults to `true`. Return `false` for single-flight jobs.
    fn allows_overlap(&self) -> bool {
        true
    }

    /// Whether the job is finished for good.
    ///
    /// Checked after each run; a disposed job is removed from the registry.
    fn is_disposed(&self) -> bool {
        false
    }

    /// The job's `(group_id, job_id)` address.
    fn key(&self) -> JobKey {
        JobKey::new(self.group_id(), self.job_id())
    }
}

/// Per-firing context handed to the job body.
#[derive(Clone)]
pub struct JobContext {
    run_id: RunId,
    tick: TickSignal,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    scheduler: Arc<dyn SchedulerControl>,
}

impl JobContext {
    pub(crate) fn new(
        run_id: RunId,
        tick: TickSignal,
        started_at: DateTime<Utc>,
        cancel: CancellationToken,
        scheduler: Arc<dyn SchedulerControl>,
    ) -> Self {
        Self {
            run_id,
            tick,
            started_at,
            cancel,
            scheduler,
        }
    }

    /// Identifier of this execution.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The tick that made the job due.
    pub fn tick(&self) -> &TickSignal {
        &self.tick
    }

    /// When the execution was dispatched.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The scheduler that dispatched this execution.
    pub fn scheduler(&self) -> &Arc<dyn SchedulerControl> {
        &self.scheduler
    }

    /// Whether an interrupt has been requested.
    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes once an interrupt has been requested.
    pub async fn interrupted(&self) {
        self.cancel.cancelled().await
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("run_id", &self.run_id)
            .field("tick", &self.tick)
            .field("started_at", &self.started_at)
            .field("interrupted", &self.cancel.is_cancelled())
            .finish()
    }
}
