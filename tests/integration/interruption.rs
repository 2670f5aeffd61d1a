//! Interruption integration tests.
//!
//! Tests that verify interrupts are cooperative signals: they are delivered
//! to matching executions only, and a job stays listed as running until it
//! actually returns.

use crate::common::{RecordingHandler, wait_for_running_count, wait_until};
use std::sync::Arc;
use std::time::Duration;
use tock::testing::{BlockingJob, tick_at};
use tock::{Event, EventBus, Scheduler, SchedulerControl, TickUnit};

const TIMEOUT: Duration = Duration::from_secs(5);

async fn dispatch_once(scheduler: &Scheduler) {
    scheduler
        .process_tick(&tick_at(2024, 6, 15, 12, 0, TickUnit::Minute))
        .await;
}

/// Test: A job that ignores interrupts keeps running until it returns.
#[tokio::test]
async fn test_interrupt_does_not_force_termination() {
    let scheduler = Scheduler::new();
    let job = Arc::new(BlockingJob::ignoring_interrupts("g", "stubborn"));
    scheduler.add_job(job.clone());
    dispatch_once(&scheduler).await;
    wait_until("job started", TIMEOUT, || job.started() == 1).await;

    let signalled = scheduler.interrupt_all_jobs();
    assert_eq!(signalled.len(), 1);
    assert!(signalled[0].is_interrupted());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(scheduler.running_job_count(), 1);
    assert!(scheduler.all_running_jobs()[0].is_interrupted());
    assert_eq!(job.finished(), 0);

    job.release();
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
    assert_eq!(job.finished(), 1);
}

/// Test: A job that observes the interrupt stops and is reported as interrupted.
#[tokio::test]
async fn test_interrupt_observed_by_cooperative_job() {
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;
    let scheduler = Scheduler::builder().with_event_bus(bus).build().unwrap();
    let job = Arc::new(BlockingJob::new("g", "cooperative"));
    scheduler.add_job(job.clone());
    dispatch_once(&scheduler).await;
    wait_until("job started", TIMEOUT, || job.started() == 1).await;

    scheduler.interrupt_jobs(Some("g"), Some("cooperative"));
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;

    let start = tokio::time::Instant::now();
    let completion = loop {
        if let Some(event) = handler.completions().await.into_iter().next() {
            break event;
        }
        assert!(start.elapsed() < TIMEOUT, "missing completion event");
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert!(matches!(
        completion,
        Event::JobCompleted {
            success: false,
            interrupted: true,
            ..
        }
    ));
}

/// Test: Interrupts only reach executions that match the filter.
#[tokio::test]
async fn test_interrupt_respects_filter() {
    let scheduler = Scheduler::new();
    let reports = Arc::new(BlockingJob::new("reports", "daily"));
    let billing = Arc::new(BlockingJob::new("billing", "daily"));
    scheduler.add_job(reports.clone());
    scheduler.add_job(billing.clone());
    dispatch_once(&scheduler).await;

    let signalled = scheduler.interrupt_jobs(Some("reports"), None);

    assert_eq!(signalled.len(), 1);
    assert_eq!(signalled[0].key().group_id(), "reports");
    wait_for_running_count(&scheduler, 1, TIMEOUT).await;

    let still_running = scheduler.running_jobs(None, Some("daily"));
    assert_eq!(still_running.len(), 1);
    assert_eq!(still_running[0].key().group_id(), "billing");
    assert!(!still_running[0].is_interrupted());

    billing.release();
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}

/// Test: Interrupting a job that is not running returns nothing.
#[tokio::test]
async fn test_interrupt_unknown_job_is_empty() {
    let scheduler = Scheduler::new();
    let job = Arc::new(BlockingJob::new("g", "running"));
    scheduler.add_job(job.clone());
    dispatch_once(&scheduler).await;

    assert!(scheduler.interrupt_jobs(Some("g"), Some("nope")).is_empty());
    assert!(scheduler.interrupt_jobs(Some("other"), None).is_empty());
    assert_eq!(scheduler.running_job_count(), 1);

    job.release();
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}

/// Test: Stopping the scheduler leaves in-flight executions running.
#[tokio::test]
async fn test_stop_does_not_interrupt_running_jobs() {
    let scheduler = Scheduler::new();
    let job = Arc::new(BlockingJob::new("g", "long"));
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();
    dispatch_once(&scheduler).await;

    scheduler.shutdown().await;

    let running = scheduler.all_running_jobs();
    assert_eq!(running.len(), 1);
    assert!(!running[0].is_interrupted());

    job.release();
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}

/// Test: A running job can be found by its run id and interrupted individually.
#[tokio::test]
async fn test_running_job_handle_interrupts_single_execution() {
    let scheduler = Scheduler::new();
    let job = Arc::new(BlockingJob::new("g", "twice"));
    scheduler.add_job(job.clone());

    let first = scheduler
        .process_tick(&tick_at(2024, 6, 15, 12, 0, TickUnit::Minute))
        .await;
    scheduler
        .process_tick(&tick_at(2024, 6, 15, 12, 1, TickUnit::Minute))
        .await;
    assert_eq!(scheduler.running_job_count(), 2);

    let target = scheduler
        .all_running_jobs()
        .into_iter()
        .find(|r| r.run_id() == first.dispatched[0])
        .unwrap();
    assert_eq!(target.tick().minute(), 0);
    target.interrupt();

    wait_for_running_count(&scheduler, 1, TIMEOUT).await;
    assert_eq!(scheduler.all_running_jobs()[0].tick().minute(), 1);

    job.release();
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}
