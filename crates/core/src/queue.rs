use async_trait::async_trait;

use bulkflow_domain::{Job, RequestId};

use crate::error::QueueError;

/// Admission-controlled executor that runs jobs on worker threads.
///
/// On every job termination the runtime invokes the request's
/// [`DependencyTracker`](crate::tracker::DependencyTracker) first and the
/// orchestrator's completion interface second.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn submit(&self, job: Job) -> Result<(), QueueError>;

    /// Cancel the request's root job if it is still queued or in flight.
    async fn cancel_request_job(&self, request_id: &RequestId) -> Result<(), QueueError>;

    /// Wake any consumer polling for progress. Invoked after every state
    /// change so a scheduler that batches work re-evaluates readiness.
    fn signal(&self);
}
