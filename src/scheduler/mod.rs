//! Scheduler engine for recurring jobs.
//!
//! This module provides the ticker loop, the job registry, due-job
//! evaluation, dispatch, the running-job tracker and the control surface
//! that ties them together.

mod access;
mod control;
mod dispatch;
mod engine;
mod evaluator;
mod provider;
mod registry;
mod ticker;
mod tracker;
mod types;

pub use access::{AccessPolicy, AllowAll, DelegatingScheduler, ReadOnly, SchedulerOperation};
pub use control::SchedulerControl;
pub use engine::{Scheduler, SchedulerBuilder};
pub use provider::{DirectExecution, ExecutionContextProvider};
pub use registry::JobRegistry;
pub use ticker::{Clock, SystemClock, Ticker};
pub use tracker::{RunningJob, RunningJobTracker};
pub use types::{SchedulerError, SchedulerState, TickReport};
