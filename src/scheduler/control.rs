//! The scheduler control surface.
//!
//! [`SchedulerControl`] is implemented by the engine itself and by
//! [`DelegatingScheduler`](super::DelegatingScheduler), so callers can hold
//! either behind an `Arc<dyn SchedulerControl>`.

use std::sync::Arc;

use super::tracker::RunningJob;
use super::types::SchedulerError;
use crate::core::job::SchedulerJob;

/// Runtime control over a scheduling engine.
///
/// Filters take `Option<&str>` for both parts of the job address; `None`
/// matches any value. None of the query or interrupt operations fail: a
/// filter that matches nothing yields an empty result.
pub trait SchedulerControl: Send + Sync {
    /// Start the ticker loop. Starting a running scheduler is a no-op.
    fn start(&self) -> Result<(), SchedulerError>;

    /// Stop the ticker loop. In-flight executions keep running.
    fn stop(&self);

    /// Whether the ticker loop is running.
    fn is_running(&self) -> bool;

    /// Enable or disable dispatch of due jobs.
    fn set_active(&self, active: bool);

    /// Whether due jobs are dispatched.
    fn is_active(&self) -> bool;

    /// Register a job. Duplicate addresses are allowed.
    fn add_job(&self, job: Arc<dyn SchedulerJob>);

    /// Remove and return all jobs matching the filter.
    fn remove_jobs(
        &self,
        group_id: Option<&str>,
        job_id: Option<&str>,
    ) -> Vec<Arc<dyn SchedulerJob>>;

    /// Remove every registered job.
    fn remove_all_jobs(&self);

    /// First registered job with this job id, regardless of group.
    fn get_job(&self, job_id: &str) -> Option<Arc<dyn SchedulerJob>>;

    /// Snapshot of the registered jobs matching the filter.
    fn get_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<Arc<dyn SchedulerJob>>;

    /// Snapshot of every registered job.
    fn all_jobs(&self) -> Vec<Arc<dyn SchedulerJob>>;

    /// Number of registered jobs.
    fn job_count(&self) -> usize;

    /// Snapshot of in-flight executions matching the filter.
    fn running_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob>;

    /// Snapshot of every in-flight execution.
    fn all_running_jobs(&self) -> Vec<RunningJob>;

    /// Number of in-flight executions.
    fn running_job_count(&self) -> usize;

    /// Signal an interrupt to matching executions and return them.
    ///
    /// Does not wait for the executions to finish.
    fn interrupt_jobs(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<RunningJob>;

    /// Signal an interrupt to every in-flight execution.
    fn interrupt_all_jobs(&self) -> Vec<RunningJob> {
        self.interrupt_jobs(None, None)
    }
}
