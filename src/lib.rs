//! tock - a tick-driven job scheduler.
//!
//! A [`Scheduler`] emits one [`TickSignal`] per time unit, asks every
//! registered [`SchedulerJob`] whether it is due for that tick, and runs the
//! due ones concurrently on the tokio runtime. Running executions can be
//! listed and interrupted through the [`SchedulerControl`] surface, which a
//! [`DelegatingScheduler`] can expose behind an [`AccessPolicy`].

pub mod config;
pub mod core;
pub mod events;
pub mod scheduler;
pub mod testing;

pub use config::{ConfigError, OverrunPolicy, SchedulerConfig, YamlLoader};
pub use core::job::{JobContext, JobError, SchedulerJob};
pub use core::schedule::{Schedule, ScheduleError, ScheduledJob};
pub use core::tick::{TickSignal, TickUnit};
pub use core::types::{JobKey, RunId};
pub use events::{Event, EventBus, EventHandler};
pub use scheduler::{
    AccessPolicy, AllowAll, Clock, DelegatingScheduler, DirectExecution,
    ExecutionContextProvider, JobRegistry, ReadOnly, RunningJob, RunningJobTracker, Scheduler,
    SchedulerBuilder, SchedulerControl, SchedulerError, SchedulerOperation, SchedulerState,
    SystemClock, TickReport, Ticker,
};
