use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use bulkflow_domain::{BulkRequest, RequestId, RequestStatus, Restriction};
use bulkflow_store::{RequestStore, StoreError};

/// Terminal disposition of one target within a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetDisposition {
    Running,
    Completed,
    Failed(String),
    Aborted(String),
}

struct RequestRecord {
    request: BulkRequest,
    status: RequestStatus,
    targets: HashMap<String, TargetDisposition>,
}

/// In-memory request registry.
pub struct MemoryRequestStore {
    requests: Mutex<HashMap<RequestId, RequestRecord>>,
}

impl MemoryRequestStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Test accessor: dispositions recorded for a request's targets.
    pub async fn target_dispositions(
        &self,
        request_id: &RequestId,
    ) -> Vec<(String, TargetDisposition)> {
        let requests = self.requests.lock().await;
        requests
            .get(request_id)
            .map(|r| {
                let mut targets: Vec<_> = r
                    .targets
                    .iter()
                    .map(|(t, d)| (t.clone(), d.clone()))
                    .collect();
                targets.sort_by(|a, b| a.0.cmp(&b.0));
                targets
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(request_id: &RequestId) -> StoreError {
    StoreError::NotFound(request_id.to_string())
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn put_request(&self, request: BulkRequest) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        requests.insert(
            request.id.clone(),
            RequestRecord {
                request,
                status: RequestStatus::Queued,
                targets: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn get_request(&self, request_id: &RequestId) -> Result<BulkRequest, StoreError> {
        let requests = self.requests.lock().await;
        requests
            .get(request_id)
            .map(|r| r.request.clone())
            .ok_or_else(|| not_found(request_id))
    }

    async fn get_status(&self, request_id: &RequestId) -> Result<RequestStatus, StoreError> {
        let requests = self.requests.lock().await;
        requests
            .get(request_id)
            .map(|r| r.status)
            .ok_or_else(|| not_found(request_id))
    }

    async fn update_status(
        &self,
        request_id: &RequestId,
        status: RequestStatus,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        let record = requests.get_mut(request_id).ok_or_else(|| not_found(request_id))?;
        tracing::debug!(request_id = %request_id, from = %record.status, to = %status, "request status");
        record.status = status;
        Ok(())
    }

    async fn get_subject(&self, request_id: &RequestId) -> Result<Option<String>, StoreError> {
        let requests = self.requests.lock().await;
        requests
            .get(request_id)
            .map(|r| r.request.subject.clone())
            .ok_or_else(|| not_found(request_id))
    }

    async fn get_restriction(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<Restriction>, StoreError> {
        let requests = self.requests.lock().await;
        requests
            .get(request_id)
            .map(|r| r.request.restriction.clone())
            .ok_or_else(|| not_found(request_id))
    }

    async fn is_request_subject(
        &self,
        request_id: &RequestId,
        subject: &str,
    ) -> Result<bool, StoreError> {
        let requests = self.requests.lock().await;
        let record = requests.get(request_id).ok_or_else(|| not_found(request_id))?;
        Ok(record.request.subject.as_deref() == Some(subject))
    }

    async fn add_target(&self, request_id: &RequestId, target: &str) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        let record = requests.get_mut(request_id).ok_or_else(|| not_found(request_id))?;
        record
            .targets
            .insert(target.to_string(), TargetDisposition::Running);
        Ok(())
    }

    async fn target_completed(
        &self,
        request_id: &RequestId,
        target: &str,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        let record = requests.get_mut(request_id).ok_or_else(|| not_found(request_id))?;
        let disposition = match error {
            None => TargetDisposition::Completed,
            Some(e) => TargetDisposition::Failed(e),
        };
        record.targets.insert(target.to_string(), disposition);
        Ok(())
    }

    async fn target_aborted(
        &self,
        request_id: &RequestId,
        target: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        let record = requests.get_mut(request_id).ok_or_else(|| not_found(request_id))?;
        record.targets.insert(
            target.to_string(),
            TargetDisposition::Aborted(error.to_string()),
        );
        Ok(())
    }

    async fn clear(&self, subject: &str, request_id: &RequestId) -> Result<(), StoreError> {
        let mut requests = self.requests.lock().await;
        let record = requests.get(request_id).ok_or_else(|| not_found(request_id))?;
        if record.request.subject.as_deref() != Some(subject) {
            return Err(StoreError::Other(format!(
                "subject {subject} does not own {request_id}"
            )));
        }
        requests.remove(request_id);
        Ok(())
    }
}
