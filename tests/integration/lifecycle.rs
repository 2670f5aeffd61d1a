//! Scheduler lifecycle integration tests.
//!
//! Tests that drive the real ticker loop, either against the system clock or
//! against a manual clock on paused tokio time.

use crate::common::{RecordingHandler, wait_for_running_count, wait_until};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tock::testing::{ManualClock, RecordingJob};
use tock::{
    EventBus, OverrunPolicy, Scheduler, SchedulerConfig, SchedulerControl, SchedulerError,
    SchedulerState, TickUnit, YamlLoader,
};

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn manual_scheduler(clock: &Arc<ManualClock>, config: SchedulerConfig) -> Scheduler {
    Scheduler::builder()
        .with_config(config)
        .with_clock(clock.clone())
        .build()
        .unwrap()
}

/// Test: A midnight job fires exactly once when the clock crosses 23:59 -> 00:00.
#[tokio::test(start_paused = true)]
async fn test_midnight_job_fires_once_across_day_boundary() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 23, 59, 30)));
    let scheduler = manual_scheduler(&clock, SchedulerConfig::default());
    let job = Arc::new(
        RecordingJob::new("reports", "daily").with_predicate(|t| t.hour() == 0 && t.minute() == 0),
    );
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(job.run_count(), 0);

    clock.set(utc(2024, 6, 16, 0, 0, 0));
    wait_until("midnight run", Duration::from_secs(5), || job.run_count() == 1).await;

    clock.set(utc(2024, 6, 16, 0, 0, 45));
    tokio::time::sleep(Duration::from_secs(5)).await;
    clock.set(utc(2024, 6, 16, 0, 1, 0));
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(job.run_count(), 1);
    assert_eq!(job.ticks()[0].utc(), utc(2024, 6, 16, 0, 0, 0));
    assert_eq!(job.ticks()[0].day_of_month(), 16);

    scheduler.shutdown().await;
}

/// Test: Every due tick dispatches while the loop runs against the system clock.
#[tokio::test]
async fn test_start_dispatches_on_real_second_ticks() {
    let scheduler = Scheduler::builder()
        .with_tick_unit(TickUnit::Second)
        .build()
        .unwrap();
    let job = Arc::new(RecordingJob::new("heartbeat", "pulse"));
    scheduler.add_job(job.clone());

    scheduler.start().unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Running);

    wait_until("two heartbeats", Duration::from_secs(5), || job.run_count() >= 2).await;

    scheduler.shutdown().await;
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    wait_for_running_count(&scheduler, 0, Duration::from_secs(2)).await;

    let runs = job.run_count();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(job.run_count(), runs, "no ticks after shutdown");

    let ticks = job.ticks();
    assert!(ticks.iter().all(|t| t.unit() == TickUnit::Second));
    assert!(ticks.iter().all(|t| t.utc().timestamp_subsec_nanos() == 0));
}

/// Test: Stopping twice, and stopping a never-started scheduler, are harmless.
#[tokio::test]
async fn test_stop_is_idempotent() {
    let scheduler = Scheduler::new();
    scheduler.stop();

    scheduler.start().unwrap();
    scheduler.stop();
    scheduler.stop();
    scheduler.shutdown().await;

    assert!(!scheduler.is_running());
}

/// Test: A stopped scheduler can be started again.
#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 12, 0, 10)));
    let scheduler = manual_scheduler(&clock, SchedulerConfig::default());
    let job = Arc::new(RecordingJob::new("g", "j"));
    scheduler.add_job(job.clone());

    scheduler.start().unwrap();
    scheduler.shutdown().await;

    clock.set(utc(2024, 6, 15, 12, 1, 0));
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(job.run_count(), 0);

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    clock.set(utc(2024, 6, 15, 12, 2, 0));
    wait_until("run after restart", Duration::from_secs(5), || job.run_count() == 1).await;

    scheduler.shutdown().await;
}

/// Test: Starting outside of a tokio runtime reports the missing runtime.
#[test]
fn test_start_requires_runtime() {
    let scheduler = Scheduler::new();

    assert!(matches!(scheduler.start(), Err(SchedulerError::NoRuntime)));
}

/// Test: Dropping every scheduler handle ends the ticker loop.
#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_stops_loop() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 12, 0, 10)));
    let scheduler = manual_scheduler(&clock, SchedulerConfig::default());
    let job = Arc::new(RecordingJob::new("g", "j"));
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();

    drop(scheduler);

    clock.set(utc(2024, 6, 15, 12, 1, 0));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(job.run_count(), 0);
}

/// Test: Boundaries missed during a stall are replayed in order under the queue policy.
#[tokio::test(start_paused = true)]
async fn test_queue_policy_replays_missed_ticks() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 12, 0, 10)));
    let config = SchedulerConfig {
        overrun_policy: OverrunPolicy::Queue,
        ..SchedulerConfig::default()
    };
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;
    let scheduler = Scheduler::builder()
        .with_config(config)
        .with_clock(clock.clone())
        .with_event_bus(bus)
        .build()
        .unwrap();
    let job = Arc::new(RecordingJob::new("g", "every-minute"));
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    clock.set(utc(2024, 6, 15, 12, 3, 20));
    wait_until("three queued runs", Duration::from_secs(5), || job.run_count() == 3).await;

    let mut ticks: Vec<_> = job.ticks().iter().map(|t| t.utc()).collect();
    ticks.sort();
    assert_eq!(
        ticks,
        vec![
            utc(2024, 6, 15, 12, 1, 0),
            utc(2024, 6, 15, 12, 2, 0),
            utc(2024, 6, 15, 12, 3, 0),
        ]
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.ticks_processed().await, 3);

    scheduler.shutdown().await;
}

/// Test: Missed boundaries collapse into the latest one under the default policy.
#[tokio::test(start_paused = true)]
async fn test_coalesce_policy_emits_latest_tick_only() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 12, 0, 10)));
    let scheduler = manual_scheduler(&clock, SchedulerConfig::default());
    let job = Arc::new(RecordingJob::new("g", "every-minute"));
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    clock.set(utc(2024, 6, 15, 12, 3, 20));
    wait_until("coalesced run", Duration::from_secs(5), || job.run_count() == 1).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(job.run_count(), 1);
    assert_eq!(job.ticks()[0].utc(), utc(2024, 6, 15, 12, 3, 0));

    scheduler.shutdown().await;
}

/// Test: Ticks loaded from a YAML config are expressed in its timezone.
#[tokio::test(start_paused = true)]
async fn test_yaml_config_timezone_applies_to_ticks() {
    let config = YamlLoader::parse_scheduler_config(
        r#"
tick_unit: hour
timezone: Europe/Zurich
"#,
    )
    .unwrap();
    // 23:59:30 local time in Zurich (UTC+2 in June)
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 21, 59, 30)));
    let scheduler = manual_scheduler(&clock, config);
    let job = Arc::new(RecordingJob::new("g", "local-midnight").with_predicate(|t| t.hour() == 0));
    scheduler.add_job(job.clone());
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    clock.set(utc(2024, 6, 15, 22, 0, 0));
    wait_until("local midnight run", Duration::from_secs(5), || job.run_count() == 1).await;

    let tick = &job.ticks()[0];
    assert_eq!(tick.unit(), TickUnit::Hour);
    assert_eq!(tick.timezone(), chrono_tz::Europe::Zurich);
    assert_eq!(tick.day_of_month(), 16);

    scheduler.shutdown().await;
}

/// Test: An inactive scheduler keeps ticking but dispatches nothing.
#[tokio::test(start_paused = true)]
async fn test_inactive_scheduler_keeps_ticking() {
    let clock = Arc::new(ManualClock::new(utc(2024, 6, 15, 12, 0, 10)));
    let handler = RecordingHandler::new();
    let bus = EventBus::new();
    bus.register(handler.clone()).await;
    let scheduler = Scheduler::builder()
        .with_clock(clock.clone())
        .with_event_bus(bus)
        .build()
        .unwrap();
    let job = Arc::new(RecordingJob::new("g", "j"));
    scheduler.add_job(job.clone());
    scheduler.set_active(false);
    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    clock.set(utc(2024, 6, 15, 12, 1, 0));
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(handler.ticks_processed().await, 1);
    assert_eq!(job.due_checks(), 1);
    assert_eq!(job.run_count(), 0);

    scheduler.set_active(true);
    clock.set(utc(2024, 6, 15, 12, 2, 0));
    wait_until("run after reactivation", Duration::from_secs(5), || job.run_count() == 1).await;

    scheduler.shutdown().await;
}
