//! Running-job tracker.
//!
//! Every dispatched execution is registered here before its body starts and
//! removed when it ends. Removal is tied to a drop guard so that returns,
//! errors and panics all clean up the entry.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::core::job::SchedulerJob;
use crate::core::tick::TickSignal;
use crate::core::types::{JobKey, RunId};

/// Handle to one in-flight execution of a job.
#[derive(Clone)]
pub struct RunningJob {
    run_id: RunId,
    key: JobKey,
    job: Arc<dyn SchedulerJob>,
    tick: TickSignal,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
}

impl RunningJob {
    pub(crate) fn new(job: Arc<dyn SchedulerJob>, tick: TickSignal) -> Self {
        Self {
            run_id: RunId::new(),
            key: job.key(),
            job,
            tick,
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// The job definition this execution belongs to.
    pub fn job(&self) -> &Arc<dyn SchedulerJob> {
        &self.job
    }

    /// The tick that triggered this execution.
    pub fn tick(&self) -> &TickSignal {
        &self.tick
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Request the execution to stop. The job body decides when to honour it.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for RunningJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningJob")
            .field("run_id", &self.run_id)
            .field("key", &self.key)
            .field("tick", &self.tick)
            .field("started_at", &self.started_at)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

/// In-flight executions in dispatch order.
#[derive(Default)]
pub struct RunningJobTracker {
    running: RwLock<Vec<RunningJob>>,
}

impl RunningJobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an execution and return the guard that removes it on drop.
    pub(crate) fn track(self: &Arc<Self>, job: RunningJob) -> TrackerGuard {
        let run_id = job.run_id();
        self.running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job);
        TrackerGuard {
            tracker: Arc::clone(self),
            run_id,
        }
    }

    fn remove(&self, run_id: RunId) {
        self.running
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|job| job.run_id() != run_id);
    }

    /// Copy of the executions matching the filter.
    pub fn matching(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|job| job.key().matches(group_id, job_id))
            .cloned()
            .collect()
    }

    /// Copy of all executions.
    pub fn snapshot(&self) -> Vec<RunningJob> {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this exact job instance has an execution in flight.
    pub fn is_running(&self, job: &Arc<dyn SchedulerJob>) -> bool {
        self.running
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|running| Arc::ptr_eq(running.job(), job))
    }

    /// Signal an interrupt to matching executions and return them.
    pub fn interrupt(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        let signalled = self.matching(group_id, job_id);
        for job in &signalled {
            job.interrupt();
        }
        signalled
    }
}

/// Removes an execution from the tracker when dropped.
pub(crate) struct TrackerGuard {
    tracker: Arc<RunningJobTracker>,
    run_id: RunId,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        self.tracker.remove(self.run_id);
    }
}
