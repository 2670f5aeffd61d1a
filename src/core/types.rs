//! Core identifier types for the scheduler.
//!
//! Jobs are addressed by an opaque `(group_id, job_id)` pair; every firing of
//! a job gets its own [`RunId`].

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The `(group_id, job_id)` address of a registered job.
///
/// Neither part is required to be unique. Empty strings are valid ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    group_id: String,
    job_id: String,
}

/// Unique identifier for a single execution of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl JobKey {
    /// Create a new key from a group id and a job id.
    pub fn new(group_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            job_id: job_id.into(),
        }
    }

    /// Get the group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Get the job id.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Check whether this key matches a filter.
    ///
    /// `None` acts as a wildcard for that part; `Some(id)` must match exactly.
    pub fn matches(&self, group_id: Option<&str>, job_id: Option<&str>) -> bool {
        group_id.is_none_or(|g| g == self.group_id) && job_id.is_none_or(|j| j == self.job_id)
    }
}

impl RunId {
    /// Generate a new random RunId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a RunId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.job_id)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
