//! Job dispatch.
//!
//! A dispatch registers the execution with the tracker, then spawns one tokio
//! task that runs the job through the execution-context provider. The caller
//! never waits for the job body.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use super::control::SchedulerControl;
use super::evaluator::panic_message;
use super::provider::ExecutionContextProvider;
use super::registry::JobRegistry;
use super::tracker::{RunningJob, RunningJobTracker};
use crate::core::job::{JobContext, SchedulerJob};
use crate::core::tick::TickSignal;
use crate::events::{Event, EventBus};

/// Spawns and tracks job executions.
pub(crate) struct Dispatcher {
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) tracker: Arc<RunningJobTracker>,
    pub(crate) provider: Arc<dyn ExecutionContextProvider>,
    pub(crate) event_bus: Arc<EventBus>,
}

impl Dispatcher {
    /// Start one execution of `job` for `tick`.
    ///
    /// The execution is visible in the tracker when this returns. Must be
    /// called from within a tokio runtime.
    pub(crate) fn dispatch(
        &self,
        job: Arc<dyn SchedulerJob>,
        tick: &TickSignal,
        scheduler: Arc<dyn SchedulerControl>,
    ) -> RunningJob {
        let running = RunningJob::new(Arc::clone(&job), tick.clone());
        let guard = self.tracker.track(running.clone());

        let ctx = JobContext::new(
            running.run_id(),
            tick.clone(),
            running.started_at(),
            running.cancellation_token(),
            scheduler,
        );
        let key = running.key().clone();
        let run_id = running.run_id();
        let registry = Arc::clone(&self.registry);
        let provider = Arc::clone(&self.provider);
        let event_bus = Arc::clone(&self.event_bus);
        let token = running.cancellation_token();

        tokio::spawn(async move {
            let start = Instant::now();
            event_bus
                .emit(Event::job_started(key.clone(), run_id))
                .await;

            let outcome = AssertUnwindSafe(provider.handle_job_execution(Arc::clone(&job), ctx))
                .catch_unwind()
                .await;

            let success = match outcome {
                Ok(Ok(())) => {
                    tracing::debug!(
                        group_id = key.group_id(),
                        job_id = key.job_id(),
                        run_id = %run_id,
                        "Job execution completed"
                    );
                    true
                }
                Ok(Err(e)) => {
                    tracing::error!(
                        group_id = key.group_id(),
                        job_id = key.job_id(),
                        run_id = %run_id,
                        error = %e,
                        "Job execution failed"
                    );
                    false
                }
                Err(panic) => {
                    tracing::error!(
                        group_id = key.group_id(),
                        job_id = key.job_id(),
                        run_id = %run_id,
                        panic = panic_message(panic.as_ref()),
                        "Job execution panicked"
                    );
                    false
                }
            };

            if job.is_disposed() && registry.remove_instance(&job) {
                tracing::info!(
                    group_id = key.group_id(),
                    job_id = key.job_id(),
                    "Removed disposed job"
                );
            }

            // Leave the running set before announcing completion
            drop(guard);

            event_bus
                .emit(Event::job_completed(
                    key,
                    run_id,
                    success,
                    token.is_cancelled(),
                    start.elapsed(),
                ))
                .await;
        });

        running
    }
}
