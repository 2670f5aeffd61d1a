//! Job registry.
//!
//! Thread-safe, insertion-ordered storage of registered job definitions.
//! Reads return snapshots, so callers can iterate while the registry changes.

use std::sync::{Arc, PoisonError, RwLock};

use crate::core::job::SchedulerJob;

/// Registered jobs in insertion order.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<Vec<Arc<dyn SchedulerJob>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a job.
    pub fn add(&self, job: Arc<dyn SchedulerJob>) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job);
    }

    /// Remove and return every job matching the filter.
    pub fn remove_matching(
        &self,
        group_id: Option<&str>,
        job_id: Option<&str>,
    ) -> Vec<Arc<dyn SchedulerJob>> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        // Match before mutating: a panicking job accessor must leave the registry intact.
        let hits: Vec<bool> = jobs
            .iter()
            .map(|job| job.key().matches(group_id, job_id))
            .collect();
        let mut hits = hits.into_iter();
        let mut removed = Vec::new();
        jobs.retain(|job| {
            let hit = hits.next().unwrap_or(false);
            if hit {
                removed.push(Arc::clone(job));
            }
            !hit
        });
        removed
    }

    /// Remove this exact job instance, leaving other jobs with the same
    /// address in place. Returns whether it was registered.
    pub fn remove_instance(&self, job: &Arc<dyn SchedulerJob>) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        let before = jobs.len();
        jobs.retain(|registered| !Arc::ptr_eq(registered, job));
        jobs.len() != before
    }

    /// Remove every job.
    pub fn clear(&self) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// First job with the given job id, in insertion order.
    pub fn find_by_job_id(&self, job_id: &str) -> Option<Arc<dyn SchedulerJob>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|job| job.job_id() == job_id)
            .cloned()
    }

    /// Copy of the jobs matching the filter.
    pub fn matching(&self, group_id: Option<&str>, job_id: Option<&str>) -> Vec<Arc<dyn SchedulerJob>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|job| job.key().matches(group_id, job_id))
            .cloned()
            .collect()
    }

    /// Copy of all jobs.
    pub fn snapshot(&self) -> Vec<Arc<dyn SchedulerJob>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
