//! `map<job_id, Job>` with validation on add/update.

use std::collections::HashMap;
use std::sync::RwLock;

use evoclaw_core::{Error, Result};

use crate::job::Job;

#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, job: Job) -> Result<()> {
        job.validate()?;
        let mut jobs = self.jobs.write().expect("job store poisoned");
        if jobs.contains_key(&job.id) {
            return Err(Error::invalid_argument(format!("job already exists: {}", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn update(&self, job: Job) -> Result<()> {
        job.validate()?;
        let mut jobs = self.jobs.write().expect("job store poisoned");
        if !jobs.contains_key(&job.id) {
            return Err(Error::not_found(format!("job not found: {}", job.id)));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Result<Job> {
        self.jobs.write().expect("job store poisoned").remove(id).ok_or_else(|| Error::not_found(format!("job not found: {id}")))
    }

    pub fn get(&self, id: &str) -> Result<Job> {
        self.jobs.read().expect("job store poisoned").get(id).cloned().ok_or_else(|| Error::not_found(format!("job not found: {id}")))
    }

    pub fn list(&self) -> Vec<Job> {
        self.jobs.read().expect("job store poisoned").values().cloned().collect()
    }

    /// Apply a state mutation in place; no-op if the job was removed
    /// concurrently.
    pub fn with_state_mut(&self, id: &str, f: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().expect("job store poisoned").get_mut(id) {
            f(job);
        }
    }
}
