//! heartbeat - runs a few jobs on second ticks until Ctrl-C.
//!
//! Usage:
//!   cargo run --example heartbeat [config.yaml]
//!
//! Set `RUST_LOG=tock=debug` to see every tick and dispatch.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tock::{
    DelegatingScheduler, JobContext, JobError, ReadOnly, Schedule, ScheduledJob, Scheduler,
    SchedulerConfig, SchedulerControl, SchedulerJob, TickSignal, TickUnit, YamlLoader,
};
use tracing::{error, info};

/// Logs a line on every fifth second and counts its beats.
struct Heartbeat {
    beats: AtomicU64,
}

#[async_trait]
impl SchedulerJob for Heartbeat {
    fn group_id(&self) -> &str {
        "demo"
    }

    fn job_id(&self) -> &str {
        "heartbeat"
    }

    fn is_due(&self, tick: &TickSignal) -> Result<bool, JobError> {
        Ok(tick.second() % 5 == 0)
    }

    async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
        let beat = self.beats.fetch_add(1, Ordering::SeqCst) + 1;
        info!(beat, tick = %ctx.tick(), run_id = %ctx.run_id(), "Heartbeat");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match YamlLoader::load_scheduler_config(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => SchedulerConfig {
            tick_unit: TickUnit::Second,
            ..SchedulerConfig::default()
        },
    };

    let scheduler = match Scheduler::builder().with_config(config).build() {
        Ok(scheduler) => scheduler,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    scheduler.add_job(Arc::new(Heartbeat {
        beats: AtomicU64::new(0),
    }));

    let schedule = match Schedule::new("0,30 * * * * *") {
        Ok(schedule) => schedule,
        Err(e) => {
            error!("Invalid schedule: {}", e);
            std::process::exit(1);
        }
    };
    let slow = ScheduledJob::new(
        "demo",
        "slow-report",
        schedule,
        |ctx| async move {
            info!(tick = %ctx.tick(), "Report started");
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(45)) => {
                    info!("Report finished");
                    Ok(())
                }
                _ = ctx.interrupted() => {
                    info!("Report interrupted");
                    Err(JobError::Interrupted)
                }
            }
        },
    )
    .single_flight();
    scheduler.add_job(Arc::new(slow));

    if let Err(e) = scheduler.start() {
        error!("Failed to start scheduler: {}", e);
        std::process::exit(1);
    }

    let monitor = DelegatingScheduler::with_policy(scheduler.control(), Arc::new(ReadOnly));
    info!(jobs = monitor.job_count(), "Scheduler running, press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
    }

    info!(running = monitor.running_job_count(), "Shutting down");
    scheduler.shutdown().await;
    for running in scheduler.interrupt_all_jobs() {
        info!(job = %running.key(), "Interrupted");
    }
    while scheduler.running_job_count() > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    info!("Done");
}
