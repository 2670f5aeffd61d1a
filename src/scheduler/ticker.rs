//! Periodic tick source.
//!
//! The ticker aligns ticks to unit boundaries of local calendar time. Every
//! wait is recomputed from the current clock reading, so a jump of the wall
//! clock never accumulates drift:
//! - forward jumps and slow evaluation passes are overruns, handled by the
//!   [`OverrunPolicy`]
//! - backward jumps re-anchor the next boundary to the current time

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::VecDeque;
use std::time::Duration;

use crate::config::OverrunPolicy;
use crate::core::tick::{TickSignal, TickUnit};

/// Upper bound on a single wait so that wall-clock jumps are noticed.
const CLOCK_RECHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest stretch of local time, in seconds, searched for a boundary that exists.
const MAX_LOCAL_GAP_SECS: i64 = 2 * 86_400;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// What the ticker should do after reading the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TickerStep {
    /// Emit this tick now.
    Emit(TickSignal),
    /// Read the clock again after this long.
    Wait(Duration),
}

/// Produces one [`TickSignal`] per unit boundary.
pub struct Ticker {
    unit: TickUnit,
    timezone: Tz,
    policy: OverrunPolicy,
    max_backlog: usize,
    /// Next boundary to emit, in local time.
    next: Option<NaiveDateTime>,
    backlog: VecDeque<TickSignal>,
}

impl Ticker {
    pub fn new(unit: TickUnit, timezone: Tz) -> Self {
        Self {
            unit,
            timezone,
            policy: OverrunPolicy::Coalesce,
            max_backlog: crate::config::DEFAULT_MAX_BACKLOG,
            next: None,
            backlog: VecDeque::new(),
        }
    }

    pub fn with_overrun_policy(mut self, policy: OverrunPolicy, max_backlog: usize) -> Self {
        self.policy = policy;
        self.max_backlog = max_backlog.max(1);
        self
    }

    pub fn unit(&self) -> TickUnit {
        self.unit
    }

    /// Wait for the next boundary and return its tick.
    pub async fn next_tick(&mut self, clock: &dyn Clock) -> TickSignal {
        loop {
            match self.poll(clock.now()) {
                TickerStep::Emit(tick) => return tick,
                TickerStep::Wait(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Advance the ticker state for a clock reading.
    pub(crate) fn poll(&mut self, now: DateTime<Utc>) -> TickerStep {
        if let Some(tick) = self.backlog.pop_front() {
            return TickerStep::Emit(tick);
        }

        let local = now.with_timezone(&self.timezone).naive_local();
        let current = self.unit.truncate(local);
        let following = self.existing_boundary(self.unit.advance(current));
        let next = *self.next.get_or_insert(following);

        if following < next {
            tracing::warn!(
                now = %now,
                expected = %next,
                "Clock moved backwards, re-anchoring ticker"
            );
            self.next = Some(following);
            return self.wait_until(now);
        }

        if current < next {
            return self.wait_until(now);
        }

        let missed = self.unit.periods_between(next, current);
        self.next = Some(following);

        if missed > 0 {
            match self.policy {
                OverrunPolicy::Coalesce => {
                    tracing::warn!(
                        missed,
                        unit = %self.unit,
                        "Tick boundaries missed, coalescing into one tick"
                    );
                }
                OverrunPolicy::Queue => self.queue_missed(next, current, missed),
            }
        }

        if let Some(tick) = self.tick_for(current) {
            self.backlog.push_back(tick);
        }
        match self.backlog.pop_front() {
            Some(tick) => TickerStep::Emit(tick),
            None => self.wait_until(now),
        }
    }

    /// Queue the boundaries in `[from, until)`, keeping at most `max_backlog - 1`
    /// of the most recent ones to leave room for `until` itself.
    fn queue_missed(&mut self, from: NaiveDateTime, until: NaiveDateTime, missed: i64) {
        let keep = (self.max_backlog - 1) as i64;
        let mut boundary = from;
        if missed > keep {
            tracing::warn!(
                missed,
                dropped = missed - keep,
                "Tick backlog full, dropping oldest missed ticks"
            );
            boundary = until - self.unit.duration() * (keep as i32);
        }
        while boundary < until {
            if let Some(tick) = self.tick_for(boundary) {
                self.backlog.push_back(tick);
            }
            boundary = self.unit.advance(boundary);
        }
    }

    fn wait_until(&self, now: DateTime<Utc>) -> TickerStep {
        let delay = match self.next.and_then(|next| self.to_utc(next)) {
            Some(target) => (target - now).to_std().unwrap_or(Duration::ZERO),
            None => CLOCK_RECHECK_INTERVAL,
        };
        TickerStep::Wait(delay.min(CLOCK_RECHECK_INTERVAL))
    }

    /// First boundary at or after `boundary` that exists in local time.
    ///
    /// Boundaries inside a DST gap are never waited for, so the ticker
    /// neither spins on them nor counts them as missed.
    fn existing_boundary(&self, boundary: NaiveDateTime) -> NaiveDateTime {
        let mut candidate = boundary;
        while (candidate - boundary).num_seconds() <= MAX_LOCAL_GAP_SECS {
            if self.to_utc(candidate).is_some() {
                if candidate != boundary {
                    tracing::debug!(
                        skipped = %boundary,
                        next = %candidate,
                        "Next boundary falls into a DST gap"
                    );
                }
                return candidate;
            }
            candidate = self.unit.advance(candidate);
        }
        boundary
    }

    fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Tick for a local boundary; `None` if the boundary falls into a DST gap.
    fn tick_for(&self, local: NaiveDateTime) -> Option<TickSignal> {
        let tick = self
            .timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|ts| TickSignal::new(ts, self.unit));
        if tick.is_none() {
            tracing::debug!(boundary = %local, "Skipping boundary that does not exist in local time");
        }
        tick
    }
}
