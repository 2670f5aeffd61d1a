//! Schedule-based due predicates.
//!
//! Supports standard cron expressions, extended 6-field cron (with seconds),
//! shortcuts (@daily, @hourly, etc.), and aligned interval expressions
//! (@every). A [`ScheduledJob`] pairs a schedule with an async job body.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use futures::future::BoxFuture;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use super::job::{JobContext, JobError, SchedulerJob};
use super::tick::TickSignal;
use super::types::JobKey;

/// Errors that can occur when parsing schedules.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval expression.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// Invalid timezone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// A calendar rule deciding which ticks a job is due on.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// The original expression string.
    expression: String,
    /// The timezone the rule is evaluated in.
    timezone: Tz,
    /// Parsed schedule type.
    schedule_type: ScheduleType,
}

#[derive(Debug, Clone)]
enum ScheduleType {
    /// Standard cron schedule.
    Cron(Box<CronSchedule>),
    /// Interval aligned to local midnight of the epoch day (e.g., @every 5m).
    Interval(i64),
}

impl Schedule {
    /// Create a new schedule evaluated in UTC.
    ///
    /// Supports:
    /// - Standard 5-field cron: `minute hour day month weekday`
    /// - Extended 6-field cron: `second minute hour day month weekday`
    /// - Shortcuts: `@yearly`, `@monthly`, `@weekly`, `@daily`, `@hourly`
    /// - Intervals: `@every 5m`, `@every 1h30m`
    pub fn new(expression: impl Into<String>) -> Result<Self, ScheduleError> {
        Self::with_timezone(expression, "UTC")
    }

    /// Create a new schedule evaluated in a specific timezone.
    pub fn with_timezone(
        expression: impl Into<String>,
        timezone: impl AsRef<str>,
    ) -> Result<Self, ScheduleError> {
        let expression = expression.into();
        let timezone = timezone.as_ref();
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_string()))?;

        let schedule_type = Self::parse_expression(&expression)?;

        Ok(Self {
            expression,
            timezone,
            schedule_type,
        })
    }

    fn parse_expression(expression: &str) -> Result<ScheduleType, ScheduleError> {
        let trimmed = expression.trim();

        if trimmed.starts_with('@') {
            return Self::parse_shortcut(trimmed);
        }

        Self::parse_cron(trimmed)
    }

    fn parse_shortcut(expression: &str) -> Result<ScheduleType, ScheduleError> {
        match expression.to_lowercase().as_str() {
            "@yearly" | "@annually" => Self::parse_cron("0 0 1 1 *"),
            "@monthly" => Self::parse_cron("0 0 1 * *"),
            "@weekly" => Self::parse_cron("0 0 * * SUN"),
            "@daily" | "@midnight" => Self::parse_cron("0 0 * * *"),
            "@hourly" => Self::parse_cron("0 * * * *"),
            s if s.starts_with("@every ") => {
                Ok(ScheduleType::Interval(Self::parse_duration(s[7..].trim())?))
            }
            _ => Err(ScheduleError::InvalidCron(format!(
                "unknown shortcut: {}",
                expression
            ))),
        }
    }

    /// Parse a duration string like "5m", "1h", "1h30m", "30s" into seconds.
    fn parse_duration(s: &str) -> Result<i64, ScheduleError> {
        let mut total_secs: i64 = 0;
        let mut current_num = String::new();

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
            } else {
                let num: i64 = current_num
                    .parse()
                    .map_err(|_| ScheduleError::InvalidInterval(s.to_string()))?;
                current_num.clear();

                let unit_secs = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    'd' => 86400,
                    _ => return Err(ScheduleError::InvalidInterval(s.to_string())),
                };
                total_secs = num
                    .checked_mul(unit_secs)
                    .and_then(|secs| total_secs.checked_add(secs))
                    .ok_or_else(|| ScheduleError::InvalidInterval(s.to_string()))?;
            }
        }

        if total_secs == 0 || !current_num.is_empty() {
            return Err(ScheduleError::InvalidInterval(s.to_string()));
        }

        Ok(total_secs)
    }

    fn parse_cron(expression: &str) -> Result<ScheduleType, ScheduleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();

        let cron_expr = match fields.len() {
            5 => format!("0 {}", expression),
            6 => expression.to_string(),
            _ => {
                return Err(ScheduleError::InvalidCron(format!(
                    "expected 5 or 6 fields, got {}",
                    fields.len()
                )));
            }
        };

        let schedule = CronSchedule::from_str(&cron_expr)
            .map_err(|e| ScheduleError::InvalidCron(e.to_string()))?;

        Ok(ScheduleType::Cron(Box::new(schedule)))
    }

    /// Check whether the tick falls on this schedule.
    ///
    /// The tick is matched at its own precision: a 5-field cron expression
    /// only matches ticks at second zero, and rules finer than the tick unit
    /// never match in between boundaries.
    pub fn is_due(&self, tick: &TickSignal) -> bool {
        let local: DateTime<Tz> = tick.timestamp().with_timezone(&self.timezone);
        match &self.schedule_type {
            ScheduleType::Cron(schedule) => schedule.includes(local),
            ScheduleType::Interval(secs) => {
                let local_secs = local.naive_local().and_utc().timestamp();
                local_secs.rem_euclid(*secs) == 0
            }
        }
    }

    /// Get the original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Get the timezone.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

type JobBody = Arc<dyn Fn(JobContext) -> BoxFuture<'static, Result<(), JobError>> + Send + Sync>;

/// A job driven by a [`Schedule`] with an async closure as its body.
///
/// # Example
///
/// ```ignore
/// let job = ScheduledJob::new("reports", "daily", Schedule::new("@daily")?, |ctx| async move {
///     tracing::info!(tick = %ctx.tick(), "building report");
///     Ok(())
/// })
/// .single_flight();
/// ```
#[derive(Clone)]
pub struct ScheduledJob {
    key: JobKey,
    schedule: Schedule,
    body: JobBody,
    allows_overlap: bool,
}

impl ScheduledJob {
    /// Create a job that runs `body` whenever `schedule` is due.
    pub fn new<F, Fut>(
        group_id: impl Into<String>,
        job_id: impl Into<String>,
        schedule: Schedule,
        body: F,
    ) -> Self
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        Self {
            key: JobKey::new(group_id, job_id),
            schedule,
            body: Arc::new(move |ctx| Box::pin(body(ctx))),
            allows_overlap: true,
        }
    }

    /// Skip due firings while a previous run is still in flight.
    pub fn single_flight(mut self) -> Self {
        self.allows_overlap = false;
        self
    }

    /// Get the schedule.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}

impl std::fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("key", &self.key)
            .field("schedule", &self.schedule.expression)
            .field("allows_overlap", &self.allows_overlap)
            .finish()
    }
}

#[async_trait]
impl SchedulerJob for ScheduledJob {
    fn group_id(&self) -> &str {
        self.key.group_id()
    }

    fn job_id(&self) -> &str {
        self.key.job_id()
    }

    fn is_due(&self, tick: &TickSignal) -> Result<bool, JobError> {
        Ok(self.schedule.is_due(tick))
    }

    async fn run(&self, ctx: JobContext) -> Result<(), JobError> {
        (self.body)(ctx).await
    }

    fn allows_overlap(&self) -> bool {
        self.allows_overlap
    }
}
