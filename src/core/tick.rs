//! Tick signals emitted by the ticker.
//!
//! A [`TickSignal`] is an immutable, timezone-aware instant aligned to a
//! [`TickUnit`] boundary. Due predicates read the calendar fields from it.

use chrono::{
    DateTime, Datelike, DurationRound, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Granularity at which the ticker emits signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickUnit {
    /// One tick at the start of every second.
    Second,
    /// One tick at the start of every minute.
    #[default]
    Minute,
    /// One tick at the start of every hour.
    Hour,
    /// One tick at local midnight.
    Day,
}

impl TickUnit {
    /// Length of one period.
    pub fn duration(&self) -> TimeDelta {
        match self {
            TickUnit::Second => TimeDelta::seconds(1),
            TickUnit::Minute => TimeDelta::minutes(1),
            TickUnit::Hour => TimeDelta::hours(1),
            TickUnit::Day => TimeDelta::days(1),
        }
    }

    /// Truncate a local calendar time to the boundary at or before it.
    pub fn truncate(&self, local: NaiveDateTime) -> NaiveDateTime {
        local.duration_trunc(self.duration()).unwrap_or(local)
    }

    /// The boundary following `boundary`.
    pub fn advance(&self, boundary: NaiveDateTime) -> NaiveDateTime {
        boundary + self.duration()
    }

    /// Number of whole periods from `from` up to `to`.
    pub(crate) fn periods_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        let step = self.duration().num_seconds();
        (to - from).num_seconds().div_euclid(step)
    }
}

impl fmt::Display for TickUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickUnit::Second => "second",
            TickUnit::Minute => "minute",
            TickUnit::Hour => "hour",
            TickUnit::Day => "day",
        };
        f.write_str(name)
    }
}

/// An immutable tick: the boundary instant and the unit it was aligned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSignal {
    timestamp: DateTime<Tz>,
    unit: TickUnit,
}

impl TickSignal {
    /// Create a tick for the given instant.
    pub fn new(timestamp: DateTime<Tz>, unit: TickUnit) -> Self {
        Self { timestamp, unit }
    }

    /// Create a tick for a UTC instant.
    pub fn from_utc(timestamp: DateTime<Utc>, unit: TickUnit) -> Self {
        Self::new(timestamp.with_timezone(&Tz::UTC), unit)
    }

    /// The calendar instant of this tick.
    pub fn timestamp(&self) -> &DateTime<Tz> {
        &self.timestamp
    }

    /// The instant of this tick in UTC.
    pub fn utc(&self) -> DateTime<Utc> {
        self.timestamp.with_timezone(&Utc)
    }

    /// The timezone the calendar fields are expressed in.
    pub fn timezone(&self) -> Tz {
        self.timestamp.timezone()
    }

    /// The granularity this tick was emitted at.
    pub fn unit(&self) -> TickUnit {
        self.unit
    }

    pub fn second(&self) -> u32 {
        self.timestamp.second()
    }

    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }

    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    /// Day of month, starting at 1.
    pub fn day_of_month(&self) -> u32 {
        self.timestamp.day()
    }

    /// Day counted from the end of the month: 1 is the last day.
    pub fn day_of_month_reverse(&self) -> u32 {
        days_in_month(self.timestamp.year(), self.timestamp.month()) - self.timestamp.day() + 1
    }

    /// Month, starting at 1.
    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    pub fn weekday(&self) -> Weekday {
        self.timestamp.weekday()
    }

    /// Day of year, starting at 1.
    pub fn day_of_year(&self) -> u32 {
        self.timestamp.ordinal()
    }

    /// ISO 8601 week number.
    pub fn iso_week(&self) -> u32 {
        self.timestamp.iso_week().week()
    }

    /// Seconds elapsed since local midnight.
    pub fn second_of_day(&self) -> u32 {
        self.timestamp.num_seconds_from_midnight()
    }
}

impl fmt::Display for TickSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.timestamp.timezone(),
            self.unit
        )
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 31,
    }
}
