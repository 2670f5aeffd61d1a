//! Scheduler type definitions.
//!
//! This module contains error types, state enums, and the per-tick report.

use thiserror::Error;

use crate::core::types::RunId;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `start` was called outside of a tokio runtime.
    #[error("no tokio runtime available to drive the ticker")]
    NoRuntime,

    /// The caller is not permitted to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),
}

/// State of the ticker loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No ticks are produced.
    Stopped,
    /// Ticks are produced and evaluated.
    Running,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Number of registered jobs checked against the tick.
    pub evaluated: usize,
    /// Number of jobs whose predicate returned `true`.
    pub due: usize,
    /// Executions started for this tick, in dispatch order.
    pub dispatched: Vec<RunId>,
    /// Due jobs skipped because dispatch was inactive.
    pub skipped_inactive: usize,
    /// Due single-flight jobs skipped because a run was still in flight.
    pub skipped_overlap: usize,
}
