//! Execution-context providers.
//!
//! The engine hands every firing to an [`ExecutionContextProvider`], which
//! sets up whatever the application needs around a job (identity, transaction,
//! locale) and then runs it. Only the owning engine ever calls the provider.

use async_trait::async_trait;
use std::sync::Arc;

use crate::core::job::{JobContext, JobError, SchedulerJob};

/// Wraps the execution of a job in an application-defined context.
#[async_trait]
pub trait ExecutionContextProvider: Send + Sync {
    /// Run `job` inside the provider's context.
    ///
    /// Implementations are expected to call `job.run(ctx)` exactly once.
    async fn handle_job_execution(
        &self,
        job: Arc<dyn SchedulerJob>,
        ctx: JobContext,
    ) -> Result<(), JobError>;
}

/// Runs jobs with no surrounding context.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecution;

#[async_trait]
impl ExecutionContextProvider for DirectExecution {
    async fn handle_job_execution(
        &self,
        job: Arc<dyn SchedulerJob>,
        ctx: JobContext,
    ) -> Result<(), JobError> {
        job.run(ctx).await
    }
}
