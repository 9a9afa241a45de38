use crate::error::DomainError;
use crate::key::JobKey;
use crate::state::JobState;

/// What a job does within a request's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// The top-level job representing the entire request.
    Request,
    /// Enumerates a directory's children, producing further jobs.
    Expansion,
    /// Applies the requested activity to one concrete target.
    Leaf,
}

impl JobKind {
    /// Root and expansion jobs may spawn children; leaf jobs cannot.
    pub fn can_spawn_children(self) -> bool {
        matches!(self, Self::Request | Self::Expansion)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Expansion => "expansion",
            Self::Leaf => "leaf",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of a request's job tree, persisted in the job registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub key: JobKey,
    /// `None` only for the root job.
    pub parent_key: Option<JobKey>,
    pub kind: JobKind,
    pub state: JobState,
    /// Path or identifier this job operates on. The root carries the
    /// request's initial target list instead.
    #[serde(default)]
    pub target: Option<String>,
    /// Listing attributes for the target (claim-check style, opaque here).
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
    /// Present once the job has failed.
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    pub fn is_root(&self) -> bool {
        self.kind == JobKind::Request
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == JobKind::Leaf
    }

    /// Advance the job's state, enforcing the state machine.
    pub fn advance(&mut self, next: JobState) -> Result<(), DomainError> {
        self.state = self.state.transition_to(next)?;
        Ok(())
    }

    /// Record a failure: state plus the error object reported upstream.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), DomainError> {
        self.advance(JobState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{JobId, RequestId};

    fn leaf_job() -> Job {
        let request_id = RequestId::new("req_r1").unwrap();
        Job {
            key: JobKey::new(request_id.clone(), JobId::new("job_child").unwrap()),
            parent_key: Some(JobKey::new(request_id, JobId::new("job_root").unwrap())),
            kind: JobKind::Leaf,
            state: JobState::Created,
            target: Some("/data/file-1".to_string()),
            attributes: None,
            error: None,
        }
    }

    #[test]
    fn spawn_rules() {
        assert!(JobKind::Request.can_spawn_children());
        assert!(JobKind::Expansion.can_spawn_children());
        assert!(!JobKind::Leaf.can_spawn_children());
    }

    #[test]
    fn advance_follows_state_machine() {
        let mut job = leaf_job();
        job.advance(JobState::Running).unwrap();
        job.advance(JobState::Completed).unwrap();
        assert!(job.advance(JobState::Running).is_err());
    }

    #[test]
    fn fail_records_error_object() {
        let mut job = leaf_job();
        job.advance(JobState::Running).unwrap();
        job.fail("permission denied").unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn fail_before_running_is_rejected() {
        let mut job = leaf_job();
        assert!(job.fail("too early").is_err());
        assert!(job.error.is_none());
    }

    #[test]
    fn serde_round_trip() {
        let job = leaf_job();
        let json = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, job.key);
        assert_eq!(back.kind, JobKind::Leaf);
        assert_eq!(back.target.as_deref(), Some("/data/file-1"));
    }
}
