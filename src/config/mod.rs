//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the scheduler engine.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{DEFAULT_MAX_BACKLOG, OverrunPolicy, SchedulerConfig};
pub use yaml::YamlLoader;
