use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use bulkflow_domain::{BulkRequest, Job, JobKey, JobState, RequestId, RequestStatus};
use bulkflow_store::{JobFilter, JobStore, RequestStore, StoreError};

use crate::config::TrackerConfig;
use crate::error::OrchestratorError;
use crate::factory::JobFactory;
use crate::queue::JobQueue;
use crate::stats::BulkStats;
use crate::tracker::DependencyTracker;

/// Submission interface jobs and external callers invoke.
///
/// Passed to jobs as an explicit handle; jobs never hold the orchestrator's
/// internals.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    /// Queue a leaf job applying the request's activity to one target.
    async fn submit_single_target_job(
        &self,
        target: &str,
        attributes: Option<serde_json::Value>,
        parent: &Job,
    ) -> Result<(), OrchestratorError>;

    /// Queue a directory-expansion job for one target.
    async fn submit_target_expansion_job(
        &self,
        target: &str,
        attributes: Option<serde_json::Value>,
        parent: &Job,
    ) -> Result<(), OrchestratorError>;

    /// Record a failure for a target that never became a job.
    async fn abort_request_target(
        &self,
        request_id: &RequestId,
        target: &str,
        error: &str,
    ) -> Result<(), OrchestratorError>;
}

/// Completion interface the queue invokes on job termination, after the
/// request's tracker has removed the job's edge.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    async fn request_target_completed(&self, job: Job) -> Result<(), OrchestratorError>;

    async fn request_target_failed(&self, job: Job) -> Result<(), OrchestratorError>;

    async fn request_target_cancelled(&self, job: Job) -> Result<(), OrchestratorError>;
}

/// Live per-request state. Dropped once the request reaches a terminal
/// status or is cleared.
struct RequestEntry {
    root: JobKey,
    tracker: Arc<DependencyTracker>,
    cancel: CancellationToken,
    /// Serializes submit/cancel/clear/callback handling for the request.
    lock: Mutex<()>,
}

/// Drives job submission, termination callbacks, request status transitions,
/// and cancellation cascades for every live request.
pub struct RequestOrchestrator {
    job_store: Arc<dyn JobStore>,
    request_store: Arc<dyn RequestStore>,
    queue: Arc<dyn JobQueue>,
    factory: Arc<dyn JobFactory>,
    stats: Arc<BulkStats>,
    tracker_config: TrackerConfig,
    requests: Mutex<HashMap<RequestId, Arc<RequestEntry>>>,
}

impl RequestOrchestrator {
    #[must_use]
    pub fn new(
        job_store: Arc<dyn JobStore>,
        request_store: Arc<dyn RequestStore>,
        queue: Arc<dyn JobQueue>,
        factory: Arc<dyn JobFactory>,
        stats: Arc<BulkStats>,
        tracker_config: TrackerConfig,
    ) -> Self {
        Self {
            job_store,
            request_store,
            queue,
            factory,
            stats,
            tracker_config,
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn stats(&self) -> &Arc<BulkStats> {
        &self.stats
    }

    /// The request's tracker, handed to the queue as its termination-callback
    /// target for the request's lifetime.
    pub async fn tracker(&self, request_id: &RequestId) -> Option<Arc<DependencyTracker>> {
        self.entry(request_id).await.map(|e| e.tracker.clone())
    }

    /// Cooperative cancellation handle for the job runtime to observe.
    pub async fn cancellation_token(&self, request_id: &RequestId) -> Option<CancellationToken> {
        self.entry(request_id).await.map(|e| e.cancel.clone())
    }

    /// Accept a resolved request: persist it, attach a fresh tracker, and
    /// hand the root job to the queue.
    ///
    /// # Panics
    /// Panics if `subject` or `restriction` is unresolved. Resolution happens
    /// upstream; absence here is a logic error, not a user-facing failure.
    pub async fn submit_request(&self, request: BulkRequest) -> Result<JobKey, OrchestratorError> {
        assert!(
            request.subject.is_some(),
            "request {} submitted without a resolved subject",
            request.id
        );
        assert!(
            request.restriction.is_some(),
            "request {} submitted without a resolved restriction",
            request.id
        );

        let request_id = request.id.clone();
        let root = self.factory.create_request_job(&request);
        self.request_store.put_request(request).await?;

        let tracker = Arc::new(DependencyTracker::new(
            request_id.clone(),
            self.queue.clone(),
            self.tracker_config.clone(),
        ));
        let entry = Arc::new(RequestEntry {
            root: root.key.clone(),
            tracker,
            cancel: CancellationToken::new(),
            lock: Mutex::new(()),
        });
        self.requests.lock().await.insert(request_id.clone(), entry);

        self.job_store.store(root.clone()).await?;
        self.queue.submit(root.clone()).await?;
        self.stats.request_submitted();
        tracing::info!(request_id = %request_id, root = %root.key, "bulk request submitted");
        Ok(root.key)
    }

    /// The root job has begun enumerating its direct children. Registers the
    /// marker (before any child can be submitted) and flips the request to
    /// `Started`.
    pub async fn request_processing_started(
        &self,
        request_id: &RequestId,
    ) -> Result<(), OrchestratorError> {
        let Some(entry) = self.entry(request_id).await else {
            tracing::debug!(request_id = %request_id, "processing started for finished request");
            return Ok(());
        };
        let _guard = entry.lock.lock().await;

        entry.tracker.request_processing_started(&entry.root.job_id).await;

        match self.request_store.get_status(request_id).await {
            Ok(RequestStatus::Queued) => {
                self.request_store
                    .update_status(request_id, RequestStatus::Started)
                    .await?;
            }
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(request_id = %request_id, "request cleared concurrently");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// The root job has exhausted target enumeration; its children may still
    /// be running.
    pub async fn request_processing_finished(
        &self,
        request_id: &RequestId,
    ) -> Result<(), OrchestratorError> {
        let Some(entry) = self.entry(request_id).await else {
            tracing::debug!(request_id = %request_id, "processing finished for finished request");
            return Ok(());
        };
        let _guard = entry.lock.lock().await;
        entry.tracker.request_processing_finished(&entry.root.job_id).await;
        Ok(())
    }

    /// Idempotent external cancellation.
    pub async fn cancel_request(&self, request_id: &RequestId) -> Result<(), OrchestratorError> {
        let entry = self.entry(request_id).await;
        let _guard = match &entry {
            Some(e) => Some(e.lock.lock().await),
            None => None,
        };

        let status = match self.request_store.get_status(request_id).await {
            Ok(status) => status,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(request_id = %request_id, "cancel for cleared request");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        if !status.is_active() {
            tracing::debug!(request_id = %request_id, %status, "cancel is a no-op");
            return Ok(());
        }

        let stored = self
            .job_store
            .find(JobFilter::for_request(request_id.clone()), 1)
            .await?;
        if stored.is_empty() {
            // Nothing to wait for.
            self.request_store
                .update_status(request_id, RequestStatus::Cancelled)
                .await?;
            self.stats.request_cancelled();
            self.drop_entry(request_id).await;
            tracing::info!(request_id = %request_id, "request cancelled with no stored jobs");
            return Ok(());
        }

        self.request_store
            .update_status(request_id, RequestStatus::Cancelling)
            .await?;
        if let Some(entry) = &entry {
            entry.cancel.cancel();
        }
        self.queue.cancel_request_job(request_id).await?;
        let cancelled = self.job_store.cancel_all(request_id).await?;
        tracing::info!(
            request_id = %request_id,
            jobs = cancelled.len(),
            "request cancelling, stored jobs marked"
        );
        // Release any barrier immediately; the termination callbacks the
        // runtime redelivers will drain the registry and land on Cancelled.
        if let Some(entry) = &entry {
            entry.tracker.clear().await;
        }
        Ok(())
    }

    /// Purge all persisted state for a finished request. Callers must cancel
    /// first: a request with stored jobs cannot be cleared.
    pub async fn clear_request(
        &self,
        subject: &str,
        request_id: &RequestId,
    ) -> Result<(), OrchestratorError> {
        let entry = self.entry(request_id).await;
        let _guard = match &entry {
            Some(e) => Some(e.lock.lock().await),
            None => None,
        };

        if !self.request_store.is_request_subject(request_id, subject).await? {
            return Err(OrchestratorError::PermissionDenied(format!(
                "subject {subject} does not own {request_id}"
            )));
        }

        let stored = self
            .job_store
            .find(JobFilter::for_request(request_id.clone()), 1)
            .await?;
        if !stored.is_empty() {
            return Err(OrchestratorError::PermissionDenied(format!(
                "request {request_id} still has stored jobs; cancel it before clearing"
            )));
        }

        self.request_store.clear(subject, request_id).await?;
        self.drop_entry(request_id).await;
        tracing::info!(request_id = %request_id, subject, "request cleared");
        Ok(())
    }

    async fn entry(&self, request_id: &RequestId) -> Option<Arc<RequestEntry>> {
        self.requests.lock().await.get(request_id).cloned()
    }

    async fn drop_entry(&self, request_id: &RequestId) {
        if let Some(entry) = self.requests.lock().await.remove(request_id) {
            entry.tracker.clear().await;
            entry.cancel.cancel();
        }
    }

    /// Shared path for both child kinds: active check, registry insert,
    /// dependency edge, enqueue.
    async fn submit_child_job(&self, mut job: Job) -> Result<(), OrchestratorError> {
        let request_id = job.key.request_id.clone();
        let Some(entry) = self.entry(&request_id).await else {
            tracing::debug!(job = %job.key, "child submitted for finished request");
            self.queue.signal();
            return Ok(());
        };
        let _guard = entry.lock.lock().await;

        let active = match self.request_store.get_status(&request_id).await {
            Ok(status) => status.is_active(),
            Err(StoreError::NotFound(_)) => false,
            Err(e) => return Err(e.into()),
        };
        if !active {
            // A child that is never queued must still be accounted as
            // terminated, or its parent's barrier would hang forever.
            job.state = JobState::Cancelled;
            tracing::debug!(job = %job.key, "request inactive, synthesizing cancellation");
            entry.tracker.job_cancelled(&job).await;
            return Ok(());
        }

        self.job_store.store(job.clone()).await?;
        entry.tracker.add_child(&job).await;

        if job.is_leaf()
            && let Some(target) = &job.target
        {
            match self.request_store.add_target(&request_id, target).await {
                Ok(()) => {}
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(job = %job.key, "request cleared concurrently");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.queue.submit(job).await?;
        Ok(())
    }

    /// Shared termination handler behind all three completion callbacks.
    async fn handle_termination(
        &self,
        job: Job,
        terminal: JobState,
    ) -> Result<(), OrchestratorError> {
        let request_id = job.key.request_id.clone();
        let Some(entry) = self.entry(&request_id).await else {
            tracing::debug!(job = %job.key, "terminal callback for finished request");
            return Ok(());
        };
        let _guard = entry.lock.lock().await;

        match self.terminal_steps(&entry, &job, terminal).await {
            // The request was cleared concurrently: an accepted race.
            Err(OrchestratorError::Store(StoreError::NotFound(id))) => {
                tracing::debug!(job = %job.key, request_id = %id, "request cleared during terminal handling");
                Ok(())
            }
            other => other,
        }
    }

    async fn terminal_steps(
        &self,
        entry: &RequestEntry,
        job: &Job,
        terminal: JobState,
    ) -> Result<(), OrchestratorError> {
        let request_id = &job.key.request_id;

        // Duplicate callbacks are detected by registry absence.
        if self.job_store.get_job(&job.key).await?.is_none() {
            tracing::debug!(job = %job.key, "duplicate terminal callback ignored");
            return Ok(());
        }
        self.job_store.delete(&job.key).await?;
        match terminal {
            JobState::Completed => self.stats.job_completed(),
            JobState::Failed => self.stats.job_failed(),
            JobState::Cancelled => self.stats.job_cancelled(),
            JobState::Interrupted => self.stats.job_interrupted(),
            JobState::Created | JobState::Running => {
                tracing::warn!(job = %job.key, state = %terminal, "terminal callback with non-terminal state");
            }
        }

        let remaining = !self
            .job_store
            .find(JobFilter::for_request(request_id.clone()), 1)
            .await?
            .is_empty();
        let complete = entry.tracker.is_request_completed().await;

        if !remaining && complete {
            self.finish_request(entry, request_id).await?;
        }

        if terminal == JobState::Failed && remaining {
            let request = self.request_store.get_request(request_id).await?;
            if request.cancel_on_failure {
                // Best-effort: the request still drains to its natural
                // terminal state through ordinary callbacks even if part of
                // the cascade fails.
                self.cascade_cancel(entry, request_id).await;
            }
        }

        if job.is_leaf()
            && let Some(target) = &job.target
        {
            let error = match terminal {
                JobState::Completed => None,
                _ => Some(
                    job.error
                        .clone()
                        .unwrap_or_else(|| terminal.as_str().to_string()),
                ),
            };
            self.request_store
                .target_completed(request_id, target, error)
                .await?;
        }

        Ok(())
    }

    /// At-most-once terminal status transition, reached when the registry
    /// holds no jobs and the tracker holds no edges.
    async fn finish_request(
        &self,
        entry: &RequestEntry,
        request_id: &RequestId,
    ) -> Result<(), OrchestratorError> {
        let status = self.request_store.get_status(request_id).await?;
        let next = match status {
            RequestStatus::Queued | RequestStatus::Started => RequestStatus::Completed,
            RequestStatus::Cancelling => RequestStatus::Cancelled,
            RequestStatus::Completed | RequestStatus::Cancelled => {
                tracing::debug!(request_id = %request_id, %status, "request already terminal");
                return Ok(());
            }
        };
        self.request_store.update_status(request_id, next).await?;
        match next {
            RequestStatus::Completed => self.stats.request_completed(),
            _ => self.stats.request_cancelled(),
        }

        entry.tracker.clear().await;
        self.requests.lock().await.remove(request_id);
        tracing::info!(request_id = %request_id, status = %next, "request reached terminal status");
        Ok(())
    }

    /// Cancel-on-failure cascade. Does not force the request's own status:
    /// the natural terminal state still lands via later callbacks.
    async fn cascade_cancel(&self, entry: &RequestEntry, request_id: &RequestId) {
        entry.cancel.cancel();
        if let Err(e) = self.queue.cancel_request_job(request_id).await {
            tracing::warn!(request_id = %request_id, error = %e, "cascade queue cancel failed");
        }
        match self.job_store.cancel_all(request_id).await {
            Ok(cancelled) => {
                tracing::info!(
                    request_id = %request_id,
                    jobs = cancelled.len(),
                    "cancel-on-failure cascade marked sibling jobs"
                );
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "cascade registry cancel failed");
            }
        }
    }
}

#[async_trait]
impl JobSubmitter for RequestOrchestrator {
    async fn submit_single_target_job(
        &self,
        target: &str,
        attributes: Option<serde_json::Value>,
        parent: &Job,
    ) -> Result<(), OrchestratorError> {
        debug_assert!(parent.kind.can_spawn_children());
        let job = self
            .factory
            .create_single_target_job(&parent.key, target, attributes);
        self.submit_child_job(job).await
    }

    async fn submit_target_expansion_job(
        &self,
        target: &str,
        attributes: Option<serde_json::Value>,
        parent: &Job,
    ) -> Result<(), OrchestratorError> {
        debug_assert!(parent.kind.can_spawn_children());
        let job = self
            .factory
            .create_target_expansion_job(&parent.key, target, attributes);
        self.submit_child_job(job).await
    }

    async fn abort_request_target(
        &self,
        request_id: &RequestId,
        target: &str,
        error: &str,
    ) -> Result<(), OrchestratorError> {
        match self
            .request_store
            .target_aborted(request_id, target, error)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(request_id = %request_id, target, "abort for cleared request");
            }
            Err(e) => return Err(e.into()),
        }
        self.stats.target_aborted();
        self.queue.signal();
        Ok(())
    }
}

#[async_trait]
impl CompletionHandler for RequestOrchestrator {
    async fn request_target_completed(&self, job: Job) -> Result<(), OrchestratorError> {
        self.handle_termination(job, JobState::Completed).await
    }

    async fn request_target_failed(&self, job: Job) -> Result<(), OrchestratorError> {
        self.handle_termination(job, JobState::Failed).await
    }

    async fn request_target_cancelled(&self, job: Job) -> Result<(), OrchestratorError> {
        self.handle_termination(job, JobState::Cancelled).await
    }
}
