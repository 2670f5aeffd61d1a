//! Configuration type definitions.

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::core::tick::TickUnit;

/// Default bound on the number of queued ticks under [`OverrunPolicy::Queue`].
pub const DEFAULT_MAX_BACKLOG: usize = 16;

/// What the ticker does with boundaries that passed while an evaluation
/// pass was still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrunPolicy {
    /// Skip missed boundaries and emit only the most recent one.
    #[default]
    Coalesce,
    /// Emit every missed boundary in order, up to `max_backlog`.
    Queue,
}

/// Scheduler configuration (tock.yaml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Granularity of emitted ticks.
    pub tick_unit: TickUnit,
    /// IANA timezone ticks are aligned and expressed in.
    pub timezone: String,
    /// Handling of boundaries missed during a slow evaluation pass.
    pub overrun_policy: OverrunPolicy,
    /// Maximum queued ticks when `overrun_policy` is `queue`.
    pub max_backlog: usize,
    /// Whether dispatch is enabled when the scheduler is built.
    pub start_active: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_unit: TickUnit::Minute,
            timezone: "UTC".to_string(),
            overrun_policy: OverrunPolicy::Coalesce,
            max_backlog: DEFAULT_MAX_BACKLOG,
            start_active: true,
        }
    }
}

impl SchedulerConfig {
    /// Check the configuration for invalid values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_timezone()?;

        if self.max_backlog == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_backlog cannot be zero".into(),
            ));
        }

        Ok(())
    }

    /// The configured timezone.
    pub fn parsed_timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidConfig(format!("unknown timezone: {}", self.timezone)))
    }
}
