//! Dispatch and registry integration tests.
//!
//! Tests that verify due jobs run concurrently, that registry filters behave
//! as documented, and that failing jobs never leak tracker entries.

use crate::common::{RecordingHandler, wait_for_running_count, wait_until};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tock::testing::{BlockingJob, FailingJob, PanickingJob, RecordingJob, tick_at};
use tock::{
    Event, EventBus, JobError, Schedule, ScheduledJob, Scheduler, SchedulerControl, TickUnit,
};

const TIMEOUT: Duration = Duration::from_secs(5);

/// Test: All due jobs of one tick are in flight at the same time.
#[tokio::test]
async fn test_due_jobs_run_concurrently() {
    let scheduler = Scheduler::new();
    let jobs: Vec<_> = (0..8)
        .map(|i| Arc::new(BlockingJob::new("batch", format!("job-{}", i))))
        .collect();
    for job in &jobs {
        scheduler.add_job(job.clone());
    }

    let report = scheduler
        .process_tick(&tick_at(2024, 6, 15, 12, 0, TickUnit::Minute))
        .await;
    assert_eq!(report.dispatched.len(), 8);

    wait_until("all jobs started", TIMEOUT, || {
        jobs.iter().all(|job| job.started() == 1)
    })
    .await;
    assert_eq!(scheduler.running_job_count(), 8);

    for job in &jobs {
        job.release();
    }
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}

/// Test: Removing by job id alone removes the job from every group.
#[tokio::test]
async fn test_remove_by_job_id_across_groups() {
    let scheduler = Scheduler::new();
    scheduler.add_job(Arc::new(RecordingJob::new("g1", "x")));
    scheduler.add_job(Arc::new(RecordingJob::new("g2", "x")));
    scheduler.add_job(Arc::new(RecordingJob::new("g2", "y")));

    let removed = scheduler.remove_jobs(None, Some("x"));

    assert_eq!(removed.len(), 2);
    let remaining = scheduler.all_jobs();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].group_id(), "g2");
    assert_eq!(remaining[0].job_id(), "y");
}

/// Test: Removing with no filter is the same as removing everything.
#[tokio::test]
async fn test_remove_without_filter_clears_registry() {
    let first = Scheduler::new();
    let second = Scheduler::new();
    for scheduler in [&first, &second] {
        scheduler.add_job(Arc::new(RecordingJob::new("g1", "a")));
        scheduler.add_job(Arc::new(RecordingJob::new("g2", "b")));
    }

    first.remove_jobs(None, None);
    second.remove_all_jobs();

    assert_eq!(first.job_count(), 0);
    assert_eq!(second.job_count(), 0);
}

/// Test: A registered job can be looked up by id.
#[tokio::test]
async fn test_get_job_returns_registered_job() {
    let scheduler = Scheduler::new();
    let job: Arc<dyn tock::SchedulerJob> = Arc::new(RecordingJob::new("g", "lookup"));
    scheduler.add_job(job.clone());

    let found = scheduler.get_job("lookup").unwrap();

    assert!(Arc::ptr_eq(&found, &job));
    assert!(scheduler.get_job("missing").is_none());
}

/// Test: Duplicate addresses are kept and both are dispatched.
#[tokio::test]
async fn test_duplicate_addresses_both_dispatched() {
    let scheduler = Scheduler::new();
    let first = Arc::new(RecordingJob::new("g", "dup"));
    let second = Arc::new(RecordingJob::new("g", "dup"));
    scheduler.add_job(first.clone());
    scheduler.add_job(second.clone());

    assert_eq!(scheduler.get_jobs(Some("g"), Some("dup")).len(), 2);

    scheduler
        .process_tick(&tick_at(2024, 6, 15, 12, 0, TickUnit::Minute))
        .await;
    wait_until("both runs", TIMEOUT, || {
        first.run_count() == 1 && second.run_count() == 1
    })
    .await;
}

/// Test: Failing and panicking runs leave nothing behind in the tracker.
#[tokio::test]
async fn test_failed_runs_do_not_leak_tracker_entries() {
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;
    let scheduler = Scheduler::builder().with_event_bus(bus).build().unwrap();
    let failing = Arc::new(FailingJob::failing_run("g", "fails"));
    scheduler.add_job(failing.clone());
    scheduler.add_job(Arc::new(PanickingJob::new("g", "panics")));

    for minute in 0..3 {
        scheduler
            .process_tick(&tick_at(2024, 6, 15, 12, minute, TickUnit::Minute))
            .await;
    }

    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
    assert_eq!(failing.run_count(), 3);
    assert_eq!(scheduler.job_count(), 2);

    wait_until_completions(&handler, 6).await;
    let completions = handler.completions().await;
    assert!(
        completions
            .iter()
            .all(|e| matches!(e, Event::JobCompleted { success: false, .. }))
    );
}

async fn wait_until_completions(handler: &RecordingHandler, expected: usize) {
    let start = tokio::time::Instant::now();
    while handler.completions().await.len() < expected {
        assert!(start.elapsed() < TIMEOUT, "missing completion events");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Test: A schedule-driven closure job fires on matching ticks only.
#[tokio::test]
async fn test_scheduled_job_follows_cron_expression() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let job = ScheduledJob::new(
        "reports",
        "quarter-hourly",
        Schedule::new("*/15 * * * *").unwrap(),
        move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), JobError>(())
            }
        },
    );
    let scheduler = Scheduler::new();
    scheduler.add_job(Arc::new(job));

    for minute in 0..31 {
        scheduler
            .process_tick(&tick_at(2024, 6, 15, 9, minute, TickUnit::Minute))
            .await;
    }

    wait_until("three cron runs", TIMEOUT, || runs.load(Ordering::SeqCst) == 3).await;
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;
}

/// Test: Jobs may reconfigure the scheduler from inside their body.
#[tokio::test]
async fn test_job_adds_follow_up_job_through_context() {
    let job = ScheduledJob::new(
        "bootstrap",
        "seed",
        Schedule::new("@every 1m").unwrap(),
        |ctx| async move {
            ctx.scheduler()
                .add_job(Arc::new(RecordingJob::new("bootstrap", "follow-up")));
            ctx.scheduler().remove_jobs(Some("bootstrap"), Some("seed"));
            Ok::<(), JobError>(())
        },
    );
    let scheduler = Scheduler::new();
    scheduler.add_job(Arc::new(job));

    scheduler
        .process_tick(&tick_at(2024, 6, 15, 9, 0, TickUnit::Minute))
        .await;
    wait_for_running_count(&scheduler, 0, TIMEOUT).await;

    let jobs = scheduler.all_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id(), "follow-up");
}
