//! Due-job evaluation.
//!
//! Each job's predicate is asked once per tick. A predicate that errors or
//! panics is logged and counts as "not due"; it never aborts the pass.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::core::job::SchedulerJob;
use crate::core::tick::TickSignal;

/// Return the jobs of `jobs` that are due for `tick`, keeping their order.
pub(crate) fn due_jobs(jobs: &[Arc<dyn SchedulerJob>], tick: &TickSignal) -> Vec<Arc<dyn SchedulerJob>> {
    jobs.iter()
        .filter(|job| is_due(job.as_ref(), tick))
        .cloned()
        .collect()
}

fn is_due(job: &dyn SchedulerJob, tick: &TickSignal) -> bool {
    match catch_unwind(AssertUnwindSafe(|| job.is_due(tick))) {
        Ok(Ok(due)) => due,
        Ok(Err(e)) => {
            tracing::warn!(
                group_id = job.group_id(),
                job_id = job.job_id(),
                tick = %tick,
                error = %e,
                "Due check failed, treating job as not due"
            );
            false
        }
        Err(panic) => {
            tracing::warn!(
                group_id = job.group_id(),
                job_id = job.job_id(),
                tick = %tick,
                panic = panic_message(panic.as_ref()),
                "Due check panicked, treating job as not due"
            );
            false
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
