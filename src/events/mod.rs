//! Lifecycle events and event handling.
//!
//! This module provides event emission for tick and job lifecycle events,
//! enabling observability into scheduling and execution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::core::types::{JobKey, RunId};

/// Lifecycle events emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum Event {
    /// An evaluation pass finished for a tick.
    TickProcessed {
        tick: DateTime<Utc>,
        /// Number of jobs found due.
        due: usize,
        /// Number of executions dispatched.
        dispatched: usize,
    },

    /// A job execution has started.
    JobStarted {
        key: JobKey,
        run_id: RunId,
        timestamp: DateTime<Utc>,
    },

    /// A job execution finished (successfully, with an error, or interrupted).
    ///
    /// Emitted after the execution has left the running-job set.
    JobCompleted {
        key: JobKey,
        run_id: RunId,
        success: bool,
        /// Whether an interrupt had been requested before the run returned.
        interrupted: bool,
        duration: Duration,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Create a TickProcessed event.
    pub fn tick_processed(tick: DateTime<Utc>, due: usize, dispatched: usize) -> Self {
        Event::TickProcessed {
            tick,
            due,
            dispatched,
        }
    }

    /// Create a JobStarted event.
    pub fn job_started(key: JobKey, run_id: RunId) -> Self {
        Event::JobStarted {
            key,
            run_id,
            timestamp: Utc::now(),
        }
    }

    /// Create a JobCompleted event.
    pub fn job_completed(
        key: JobKey,
        run_id: RunId,
        success: bool,
        interrupted: bool,
        duration: Duration,
    ) -> Self {
        Event::JobCompleted {
            key,
            run_id,
            success,
            interrupted,
            duration,
            timestamp: Utc::now(),
        }
    }

    /// Get the run id, for job events.
    pub fn run_id(&self) -> Option<RunId> {
        match self {
            Event::TickProcessed { .. } => None,
            Event::JobStarted { run_id, .. } | Event::JobCompleted { run_id, .. } => Some(*run_id),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
