use crate::ids::{JobId, RequestId};

/// Globally unique job identity: the owning request plus the job's own id.
///
/// The root job's `job_id` doubles as the request's top-level node in the
/// dependency tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct JobKey {
    pub request_id: RequestId,
    pub job_id: JobId,
}

impl JobKey {
    #[must_use]
    pub fn new(request_id: RequestId, job_id: JobId) -> Self {
        Self { request_id, job_id }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.request_id, self.job_id)
    }
}
