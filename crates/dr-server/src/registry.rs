use std::collections::HashMap;
use std::sync::Mutex;

use dr_core::{Error, Job, JobUpdate, Result};

/// In-memory registry owning the canonical copy of every job record.
///
/// All mutation funnels through [`JobStore::update`], which merges partial
/// fields under the registry lock; callers never hold a record they could
/// mutate out of band. Records live for the lifetime of the process.
pub struct JobStore {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a freshly admitted job. Ids are minted internally, so a
    /// collision is a bug; reject it rather than silently overwrite.
    pub fn create(&self, job: Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.id) {
            return Err(Error::DuplicateJob(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of the current record.
    pub fn get(&self, id: &str) -> Result<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(id.into()))
    }

    /// Atomically merge `update` into the record.
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| Error::JobNotFound(id.into()))?;
        job.apply(update);
        Ok(())
    }

}

#[cfg(test)]
impl JobStore {
    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub(crate) fn all(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}
