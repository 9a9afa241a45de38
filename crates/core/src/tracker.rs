use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

use bulkflow_domain::{Job, JobId, RequestId};

use crate::config::TrackerConfig;
use crate::queue::JobQueue;

/// Per-request parent -> children edge table.
///
/// One instance per request, owned jointly by the orchestrator and the queue
/// for that request's lifetime, and accessed concurrently by every worker
/// thread processing the request's jobs. The table is the sole shared state:
/// a request is structurally complete iff the table is empty, and a node's
/// children have all terminated iff the table has no entry for it. A parent
/// key vanishes as soon as its child set empties, so both predicates are
/// O(1) lookups with no counters to drift.
pub struct DependencyTracker {
    request_id: RequestId,
    edges: Mutex<HashMap<JobId, HashSet<JobId>>>,
    notify: Notify,
    queue: Arc<dyn JobQueue>,
    config: TrackerConfig,
}

impl DependencyTracker {
    #[must_use]
    pub fn new(request_id: RequestId, queue: Arc<dyn JobQueue>, config: TrackerConfig) -> Self {
        Self {
            request_id,
            edges: Mutex::new(HashMap::new()),
            notify: Notify::new(),
            queue,
            config,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Record the edge `parent -> child` for a newly submitted job.
    ///
    /// # Panics
    /// Panics if the job's parent belongs to a different request, or if the
    /// job has no parent at all. Either means a tracker is being shared
    /// across requests, a programming error this table must not absorb.
    pub async fn add_child(&self, job: &Job) {
        let parent = job
            .parent_key
            .as_ref()
            .unwrap_or_else(|| panic!("job {} added as a child without a parent key", job.key));
        assert_eq!(
            parent.request_id, job.key.request_id,
            "dependency tracker edge crosses requests: parent {} vs child {}",
            parent, job.key
        );
        assert_eq!(
            job.key.request_id, self.request_id,
            "job {} registered on tracker for {}",
            job.key, self.request_id
        );

        let mut edges = self.edges.lock().await;
        edges
            .entry(parent.job_id.clone())
            .or_default()
            .insert(job.key.job_id.clone());
    }

    /// Mark the root as still enumerating its direct children.
    ///
    /// Must precede any child submission for the root, closing the race
    /// where all real children finish before the root has finished
    /// discovering them.
    pub async fn request_processing_started(&self, root_id: &JobId) {
        let mut edges = self.edges.lock().await;
        edges
            .entry(root_id.clone())
            .or_default()
            .insert(JobId::marker());
        tracing::debug!(request_id = %self.request_id, root = %root_id, "root enumeration started");
    }

    /// The root has exhausted target enumeration. Its children may still be
    /// running; only the marker goes away.
    pub async fn request_processing_finished(&self, root_id: &JobId) {
        self.remove_edge(root_id, &JobId::marker()).await;
        tracing::debug!(request_id = %self.request_id, root = %root_id, "root enumeration finished");
    }

    pub async fn job_completed(&self, job: &Job) {
        self.job_terminated(job, "completed").await;
    }

    pub async fn job_failed(&self, job: &Job) {
        self.job_terminated(job, "failed").await;
    }

    pub async fn job_cancelled(&self, job: &Job) {
        self.job_terminated(job, "cancelled").await;
    }

    pub async fn job_interrupted(&self, job: &Job) {
        self.job_terminated(job, "interrupted").await;
    }

    async fn job_terminated(&self, job: &Job, reason: &'static str) {
        tracing::debug!(job = %job.key, reason, "job terminated");
        match &job.parent_key {
            Some(parent) => self.remove_edge(&parent.job_id, &job.key.job_id).await,
            // The root owns the top-level entry; it has no edge of its own.
            None => {
                self.notify.notify_waiters();
                self.queue.signal();
            }
        }
    }

    /// True iff no node of this request has outstanding children.
    pub async fn is_request_completed(&self) -> bool {
        self.edges.lock().await.is_empty()
    }

    /// True iff `parent_id` has no outstanding children.
    pub async fn are_children_all_terminated(&self, parent_id: &JobId) -> bool {
        !self.edges.lock().await.contains_key(parent_id)
    }

    /// Block until every child of `parent_id` has reached a terminal state.
    ///
    /// Used by synchronous depth-first expansion: a directory job that
    /// expanded children by recursion must wait for their queued descendants
    /// before it can itself be considered done. Bounded wait-and-recheck
    /// because wake-ups and predicate changes are not paired 1:1.
    pub async fn wait_for_children(&self, parent_id: &JobId) {
        loop {
            // Register the notification future BEFORE checking the predicate
            // to avoid the race between releasing the table lock and a
            // removal calling notify_waiters.
            let notified = self.notify.notified();

            if self.are_children_all_terminated(parent_id).await {
                return;
            }

            tokio::select! {
                () = notified => {}
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Drop every edge and wake all waiters. Used on forced cancellation so
    /// barriers release immediately instead of waiting for natural drain.
    pub async fn clear(&self) {
        let mut edges = self.edges.lock().await;
        let dropped: usize = edges.values().map(HashSet::len).sum();
        edges.clear();
        drop(edges);

        if dropped > 0 {
            tracing::debug!(request_id = %self.request_id, dropped, "tracker cleared with outstanding edges");
        }
        self.notify.notify_waiters();
        self.queue.signal();
    }

    async fn remove_edge(&self, parent_id: &JobId, child_id: &JobId) {
        let mut edges = self.edges.lock().await;
        if let Some(children) = edges.get_mut(parent_id) {
            children.remove(child_id);
            if children.is_empty() {
                edges.remove(parent_id);
            }
        }
        drop(edges);

        self.notify.notify_waiters();
        self.queue.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use async_trait::async_trait;
    use bulkflow_domain::{JobKey, JobKind, JobState};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct NullQueue {
        signals: AtomicU64,
    }

    #[async_trait]
    impl JobQueue for NullQueue {
        async fn submit(&self, _job: Job) -> Result<(), QueueError> {
            Ok(())
        }

        async fn cancel_request_job(&self, _request_id: &RequestId) -> Result<(), QueueError> {
            Ok(())
        }

        fn signal(&self) {
            self.signals.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn tracker(req: &str) -> (Arc<DependencyTracker>, Arc<NullQueue>) {
        let queue = Arc::new(NullQueue::default());
        let config = TrackerConfig {
            poll_interval: Duration::from_millis(20),
        };
        let tracker = Arc::new(DependencyTracker::new(
            RequestId::new(req).unwrap(),
            queue.clone(),
            config,
        ));
        (tracker, queue)
    }

    fn child(req: &str, parent: &str, id: &str) -> Job {
        let request_id = RequestId::new(req).unwrap();
        Job {
            key: JobKey::new(request_id.clone(), JobId::new(id).unwrap()),
            parent_key: Some(JobKey::new(request_id, JobId::new(parent).unwrap())),
            kind: JobKind::Leaf,
            state: JobState::Running,
            target: None,
            attributes: None,
            error: None,
        }
    }

    fn root_id() -> JobId {
        JobId::new("job_root").unwrap()
    }

    #[tokio::test]
    async fn empty_tracker_reports_completed() {
        let (tracker, _) = tracker("req_r1");
        assert!(tracker.is_request_completed().await);
        assert!(tracker.are_children_all_terminated(&root_id()).await);
    }

    #[tokio::test]
    async fn emptiness_iff_adds_match_removals() {
        // Completion holds exactly when every add has a matching removal.
        let (tracker, _) = tracker("req_r1");
        let c1 = child("req_r1", "job_root", "job_c1");
        let c2 = child("req_r1", "job_root", "job_c2");

        tracker.add_child(&c1).await;
        tracker.add_child(&c2).await;
        assert!(!tracker.is_request_completed().await);

        tracker.job_completed(&c1).await;
        assert!(!tracker.is_request_completed().await);

        tracker.job_failed(&c2).await;
        assert!(tracker.is_request_completed().await);
        assert!(tracker.are_children_all_terminated(&root_id()).await);
    }

    #[tokio::test]
    async fn duplicate_add_is_a_single_edge() {
        let (tracker, _) = tracker("req_r1");
        let c1 = child("req_r1", "job_root", "job_c1");

        tracker.add_child(&c1).await;
        tracker.add_child(&c1).await;
        tracker.job_completed(&c1).await;
        assert!(tracker.is_request_completed().await);
    }

    #[tokio::test]
    async fn marker_prevents_premature_completion() {
        // All real children may finish before the root stops enumerating.
        let (tracker, _) = tracker("req_r1");
        let root = root_id();
        tracker.request_processing_started(&root).await;

        let c1 = child("req_r1", "job_root", "job_c1");
        let c2 = child("req_r1", "job_root", "job_c2");
        tracker.add_child(&c1).await;
        tracker.add_child(&c2).await;
        tracker.job_completed(&c1).await;
        tracker.job_completed(&c2).await;

        assert!(!tracker.is_request_completed().await);
        assert!(!tracker.are_children_all_terminated(&root).await);

        tracker.request_processing_finished(&root).await;
        assert!(tracker.is_request_completed().await);
    }

    #[tokio::test]
    async fn terminal_variants_all_remove_the_edge() {
        let (tracker, _) = tracker("req_r1");
        let jobs = [
            child("req_r1", "job_root", "job_c1"),
            child("req_r1", "job_root", "job_c2"),
            child("req_r1", "job_root", "job_c3"),
            child("req_r1", "job_root", "job_c4"),
        ];
        for job in &jobs {
            tracker.add_child(job).await;
        }

        tracker.job_completed(&jobs[0]).await;
        tracker.job_failed(&jobs[1]).await;
        tracker.job_cancelled(&jobs[2]).await;
        tracker.job_interrupted(&jobs[3]).await;
        assert!(tracker.is_request_completed().await);
    }

    #[tokio::test]
    async fn termination_signals_the_queue() {
        let (tracker, queue) = tracker("req_r1");
        let c1 = child("req_r1", "job_root", "job_c1");
        tracker.add_child(&c1).await;

        let before = queue.signals.load(Ordering::Relaxed);
        tracker.job_completed(&c1).await;
        assert!(queue.signals.load(Ordering::Relaxed) > before);
    }

    #[tokio::test]
    async fn wait_returns_immediately_without_children() {
        let (tracker, _) = tracker("req_r1");
        tokio::time::timeout(Duration::from_millis(50), tracker.wait_for_children(&root_id()))
            .await
            .expect("barrier should not block");
    }

    #[tokio::test]
    async fn wait_unblocks_when_last_child_terminates() {
        let (tracker, _) = tracker("req_r1");
        let c1 = child("req_r1", "job_root", "job_c1");
        tracker.add_child(&c1).await;

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_children(&root_id()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        tracker.job_completed(&c1).await;
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("barrier should release")
            .unwrap();
    }

    #[tokio::test]
    async fn clear_releases_blocked_barrier() {
        // Clear unblocks waiters that still have outstanding children.
        let (tracker, _) = tracker("req_r1");
        let c1 = child("req_r1", "job_root", "job_c1");
        tracker.add_child(&c1).await;

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait_for_children(&root_id()).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        tracker.clear().await;
        tokio::time::timeout(Duration::from_millis(100), waiter)
            .await
            .expect("clear should release the barrier within one poll interval")
            .unwrap();
    }

    #[tokio::test]
    async fn foreign_request_job_panics_without_mutation() {
        // A consistent job from another request trips the ownership check.
        let (tracker, _) = tracker("req_r1");
        let bad = child("req_r2", "job_root", "job_c1");

        let result = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.add_child(&bad).await }).await
        };
        assert!(result.unwrap_err().is_panic());
        assert!(tracker.is_request_completed().await);
    }

    #[tokio::test]
    async fn mismatched_parent_request_panics() {
        // Parent and child naming different requests is fatal.
        let (tracker, _) = tracker("req_r1");
        let mut bad = child("req_r1", "job_root", "job_c1");
        bad.parent_key = Some(JobKey::new(
            RequestId::new("req_r2").unwrap(),
            JobId::new("job_root").unwrap(),
        ));

        let result = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.add_child(&bad).await }).await
        };
        assert!(result.unwrap_err().is_panic());
        assert!(tracker.is_request_completed().await);
    }

    #[tokio::test]
    async fn root_termination_is_a_wakeup_only() {
        let (tracker, queue) = tracker("req_r1");
        let root = Job {
            key: JobKey::new(RequestId::new("req_r1").unwrap(), root_id()),
            parent_key: None,
            kind: JobKind::Request,
            state: JobState::Running,
            target: None,
            attributes: None,
            error: None,
        };

        let before = queue.signals.load(Ordering::Relaxed);
        tracker.job_completed(&root).await;
        assert!(queue.signals.load(Ordering::Relaxed) > before);
        assert!(tracker.is_request_completed().await);
    }
}
