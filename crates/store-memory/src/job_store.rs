use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use bulkflow_domain::{Job, JobKey, JobState, RequestId};
use bulkflow_store::{JobFilter, JobStore, StoreError};

#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Admission bound: `store` refuses once this many jobs are held.
    pub max_jobs: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self { max_jobs: 100_000 }
    }
}

/// In-memory job registry. Shared across all requests, like the persistent
/// registry it stands in for.
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobKey, Job>>,
    config: MemoryStoreConfig,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new(config: MemoryStoreConfig) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn store(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().await;
        if jobs.len() >= self.config.max_jobs && !jobs.contains_key(&job.key) {
            return Err(StoreError::Capacity {
                limit: self.config.max_jobs,
            });
        }
        jobs.insert(job.key.clone(), job);
        Ok(())
    }

    async fn get_job(&self, key: &JobKey) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &JobKey) -> Result<(), StoreError> {
        self.jobs.lock().await.remove(key);
        Ok(())
    }

    async fn find(&self, filter: JobFilter, limit: usize) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.lock().await;
        Ok(jobs
            .values()
            .filter(|job| filter.matches(job))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn cancel_all(&self, request_id: &RequestId) -> Result<Vec<Job>, StoreError> {
        let mut jobs = self.jobs.lock().await;
        let mut cancelled = Vec::new();
        for job in jobs.values_mut() {
            if job.key.request_id == *request_id && job.state.can_transition_to(JobState::Cancelled)
            {
                job.state = JobState::Cancelled;
                cancelled.push(job.clone());
            }
        }
        tracing::debug!(
            request_id = %request_id,
            count = cancelled.len(),
            "marked stored jobs cancelled"
        );
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkflow_domain::{JobId, JobKind};

    fn job(req: &str, id: &str, state: JobState) -> Job {
        let request_id = RequestId::new(req).unwrap();
        Job {
            key: JobKey::new(request_id.clone(), JobId::new(id).unwrap()),
            parent_key: Some(JobKey::new(request_id, JobId::new("job_root").unwrap())),
            kind: JobKind::Leaf,
            state,
            target: None,
            attributes: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn store_and_get_round_trip() {
        let store = MemoryJobStore::default();
        store.store(job("req_a", "job_1", JobState::Created)).await.unwrap();

        let found = store
            .get_job(&JobKey::new(
                RequestId::new("req_a").unwrap(),
                JobId::new("job_1").unwrap(),
            ))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryJobStore::default();
        let key = JobKey::new(
            RequestId::new("req_a").unwrap(),
            JobId::new("job_1").unwrap(),
        );
        store.store(job("req_a", "job_1", JobState::Created)).await.unwrap();
        store.delete(&key).await.unwrap();
        store.delete(&key).await.unwrap();
        assert!(store.get_job(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_with_limit_one_probes_cheaply() {
        let store = MemoryJobStore::default();
        store.store(job("req_a", "job_1", JobState::Created)).await.unwrap();
        store.store(job("req_a", "job_2", JobState::Created)).await.unwrap();
        store.store(job("req_b", "job_3", JobState::Created)).await.unwrap();

        let filter = JobFilter::for_request(RequestId::new("req_a").unwrap());
        let found = store.find(filter, 1).await.unwrap();
        assert_eq!(found.len(), 1);

        let none = store
            .find(JobFilter::for_request(RequestId::new("req_c").unwrap()), 1)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn cancel_all_skips_terminal_jobs() {
        let store = MemoryJobStore::default();
        store.store(job("req_a", "job_1", JobState::Created)).await.unwrap();
        store.store(job("req_a", "job_2", JobState::Running)).await.unwrap();
        store.store(job("req_a", "job_3", JobState::Completed)).await.unwrap();
        store.store(job("req_b", "job_4", JobState::Running)).await.unwrap();

        let cancelled = store
            .cancel_all(&RequestId::new("req_a").unwrap())
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled.iter().all(|j| j.state == JobState::Cancelled));

        // Other requests untouched
        let other = store
            .get_job(&JobKey::new(
                RequestId::new("req_b").unwrap(),
                JobId::new("job_4").unwrap(),
            ))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(other.state, JobState::Running);
    }

    #[tokio::test]
    async fn capacity_bound_rejects_new_jobs() {
        let store = MemoryJobStore::new(MemoryStoreConfig { max_jobs: 1 });
        store.store(job("req_a", "job_1", JobState::Created)).await.unwrap();

        let result = store.store(job("req_a", "job_2", JobState::Created)).await;
        assert!(matches!(result, Err(StoreError::Capacity { limit: 1 })));

        // Replacing a stored job is not an admission
        store.store(job("req_a", "job_1", JobState::Running)).await.unwrap();
    }
}
