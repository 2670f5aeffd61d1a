//! Access-controlled scheduler facade.
//!
//! [`DelegatingScheduler`] forwards every control operation to an inner
//! scheduler after consulting an [`AccessPolicy`]. It deliberately holds the
//! inner scheduler only as `dyn SchedulerControl`, so it has no way to reach
//! the engine's execution-context provider.

use std::sync::Arc;

use super::control::SchedulerControl;
use super::tracker::RunningJob;
use super::types::SchedulerError;
use crate::core::job::SchedulerJob;

/// A control operation, as seen by an [`AccessPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerOperation<'a> {
    Start,
    Stop,
    SetActive(bool),
    AddJob {
        group_id: &'a str,
        job_id: &'a str,
    },
    RemoveJobs {
        group_id: Option<&'a str>,
        job_id: Option<&'a str>,
    },
    RemoveAllJobs,
    InterruptJobs {
        group_id: Option<&'a str>,
        job_id: Option<&'a str>,
    },
    /// Any read of state, registered jobs or running jobs.
    Read,
}

impl SchedulerOperation<'_> {
    /// Whether the operation leaves the scheduler unchanged.
    pub fn is_read_only(&self) -> bool {
        matches!(self, SchedulerOperation::Read)
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerOperation::Start => "start",
            SchedulerOperation::Stop => "stop",
            SchedulerOperation::SetActive(_) => "set_active",
            SchedulerOperation::AddJob { .. } => "add_job",
            SchedulerOperation::RemoveJobs { .. } => "remove_jobs",
            SchedulerOperation::RemoveAllJobs => "remove_all_jobs",
            SchedulerOperation::InterruptJobs { .. } => "interrupt_jobs",
            SchedulerOperation::Read => "read",
        }
    }
}

/// Decides which control operations a [`DelegatingScheduler`] lets through.
pub trait AccessPolicy: Send + Sync {
    fn permits(&self, operation: &SchedulerOperation<'_>) -> bool;
}

impl<F> AccessPolicy for F
where
    F: Fn(&SchedulerOperation<'_>) -> bool + Send + Sync,
{
    fn permits(&self, operation: &SchedulerOperation<'_>) -> bool {
        self(operation)
    }
}

/// Permits every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn permits(&self, _operation: &SchedulerOperation<'_>) -> bool {
        true
    }
}

/// Permits reads only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

impl AccessPolicy for ReadOnly {
    fn permits(&self, operation: &SchedulerOperation<'_>) -> bool {
        operation.is_read_only()
    }
}

/// Scheduler facade that forwards to another scheduler.
///
/// Denied operations are logged and return an empty or negative result;
/// only [`start`](SchedulerControl::start) reports the denial as an error.
pub struct DelegatingScheduler {
    delegate: Arc<dyn SchedulerControl>,
    policy: Arc<dyn AccessPolicy>,
}

impl DelegatingScheduler {
    /// Forward everything to `delegate`.
    pub fn new(delegate: Arc<dyn SchedulerControl>) -> Self {
        Self::with_policy(delegate, Arc::new(AllowAll))
    }

    /// Forward to `delegate` what `policy` permits.
    pub fn with_policy(delegate: Arc<dyn SchedulerControl>, policy: Arc<dyn AccessPolicy>) -> Self {
        Self { delegate, policy }
    }

    pub fn delegate(&self) -> &Arc<dyn SchedulerControl> {
        &self.delegate
    }

    fn allowed(&self, operation: SchedulerOperation<'_>) -> bool {
        let permitted = self.policy.permits(&operation);
        if !permitted {
            tracing::warn!(
                operation = operation.name(),
                "Scheduler operation denied by access policy"
            );
        }
        permitted
    }
}

impl std::fmt::Debug for DelegatingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatingScheduler").finish_non_exhaustive()
    }
}

impl SchedulerControl for DelegatingScheduler {
    fn start(&self) -> Result<(), SchedulerError> {
        if !self.allowed(SchedulerOperation::Start) {
            return Err(SchedulerError::AccessDenied("start".to_string()));
        }
        self.delegate.start()
    }

    fn stop(&self) {
        if self.allowed(SchedulerOperation::Stop) {
            self.delegate.stop();
        }
    }

    fn is_running(&self) -> bool {
        self.allowed(SchedulerOperation::Read) && self.delegate.is_running()
    }

    fn set_active(&self, active: bool) {
        if self.allowed(SchedulerOperation::SetActive(active)) {
            self.delegate.set_active(active);
        }
    }

    fn is_active(&self) -> bool {
        self.allowed(SchedulerOperation::Read) && self.delegate.is_active()
    }

    fn add_job(&self, job: Arc<dyn SchedulerJob>) {
        let operation = SchedulerOperation::AddJob {
            group_id: job.group_id(),
            job_id: job.job_id(),
        };
        if self.allowed(operation) {
            self.delegate.add_job(job);
        }
    }

    fn remove_jobs(
        &self,
        group_id: Option<&str>,
        job_id: Option<&str>,
    ) -> Vec<Arc<dyn SchedulerJob>> {
        if !self.allowed(SchedulerOperation::RemoveJobs { group_id, job_id }) {
            return Vec::new();
        }
        self.delegate.remove_jobs(group_id, job_id)
    }

    fn remove_all_jobs(&self) {
        if self.allowed(SchedulerOperation::RemoveAllJobs) {
            self.delegate.remove_all_jobs();
        }
    }

    fn get_job(&self, job_id: &str) -> Option<Arc<dyn SchedulerJob>> {
        if !self.allowed(SchedulerOperation::Read) {
            return None;
        }
        self.delegate.get_job(job_id)
    }

    fn get_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<Arc<dyn SchedulerJob>> {
        if !self.allowed(SchedulerOperation::Read) {
            return Vec::new();
        }
        self.delegate.get_jobs(group_id, job_id)
    }

    fn all_jobs(&self) -> Vec<Arc<dyn SchedulerJob>> {
        if !self.allowed(SchedulerOperation::Read) {
            return Vec::new();
        }
        self.delegate.all_jobs()
    }

    fn job_count(&self) -> usize {
        if !self.allowed(SchedulerOperation::Read) {
            return 0;
        }
        self.delegate.job_count()
    }

    fn running_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        if !self.allowed(SchedulerOperation::Read) {
            return Vec::new();
        }
        self.delegate.running_jobs(group_id, job_id)
    }

    fn all_running_jobs(&self) -> Vec<RunningJob> {
        if !self.allowed(SchedulerOperation::Read) {
            return Vec::new();
        }
        self.delegate.all_running_jobs()
    }

    fn running_job_count(&self) -> usize {
        if !self.allowed(SchedulerOperation::Read) {
            return 0;
        }
        self.delegate.running_job_count()
    }

    fn interrupt_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob> {
        if !self.allowed(SchedulerOperation::InterruptJobs { group_id, job_id }) {
            return Vec::new();
        }
        self.delegate.interrupt_jobs(group_id, job_id)
    }

    fn interrupt_all_jobs(&self) -> Vec<RunningJob> {
        let operation = SchedulerOperation::InterruptJobs {
            group_id: None,
            job_id: None,
        };
        if !self.allowed(operation) {
            return Vec::new();
        }
        self.delegate.interrupt_all_jobs()
    }
}
