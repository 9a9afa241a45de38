use async_trait::async_trait;

use bulkflow_domain::{BulkRequest, Job, JobKey, JobState, RequestId, RequestStatus, Restriction};

use crate::error::StoreError;

/// Filter for job registry scans. The orchestrator probes "any jobs remain
/// for this request" with `request_id` set and `limit = 1`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub request_id: Option<RequestId>,
    pub state: Option<JobState>,
}

impl JobFilter {
    #[must_use]
    pub fn for_request(request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            state: None,
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(request_id) = &self.request_id
            && job.key.request_id != *request_id
        {
            return false;
        }
        if let Some(state) = self.state
            && job.state != state
        {
            return false;
        }
        true
    }
}

/// Persistent job registry, shared across all requests.
///
/// Must support concurrent access from many requests; `find` with `limit = 1`
/// is the cheap "anything left" probe.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn store(&self, job: Job) -> Result<(), StoreError>;

    async fn get_job(&self, key: &JobKey) -> Result<Option<Job>, StoreError>;

    async fn delete(&self, key: &JobKey) -> Result<(), StoreError>;

    async fn find(&self, filter: JobFilter, limit: usize) -> Result<Vec<Job>, StoreError>;

    /// Mark every stored, non-terminal job of the request cancelled and
    /// return them. The job runtime redelivers ordinary termination
    /// callbacks for each.
    async fn cancel_all(&self, request_id: &RequestId) -> Result<Vec<Job>, StoreError>;
}

/// Persistent request registry.
///
/// Every accessor returns `StoreError::NotFound` if the request was cleared
/// concurrently.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn put_request(&self, request: BulkRequest) -> Result<(), StoreError>;

    async fn get_request(&self, request_id: &RequestId) -> Result<BulkRequest, StoreError>;

    async fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, StoreError>;

    async fn update_status(
        &self,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> Result<(), StoreError>;

    async fn get_subject(&self, request_id: &RequestId) -> Result<Option<String>, StoreError>;

    async fn get_restriction(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Restriction>, StoreError>;

    /// Whether `subject` owns the request; used for cancel/clear authorization.
    async fn is_request_subject(
        &self,
        request_id: &RequestId,
        subject: &str,
    ) -> Result<bool, StoreError>;

    /// Register a leaf target against the request's running count.
    async fn add_target(&self, request_id: &RequestId, target: &str) -> Result<(), StoreError>;

    /// Record a leaf target's terminal outcome for later status reporting.
    async fn target_completed(
        &self,
        request_id: &RequestId,
        target: &str,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    /// Record a premature failure for a target that never became a job.
    async fn target_aborted(
        &self,
        request_id: &RequestId,
        target: &str,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Purge all persisted state for the request.
    async fn clear(&self, subject: &str, request_id: &RequestId) -> Result<(), StoreError>;
}
