use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counters. Increment-only, reset by an admin command.
#[derive(Debug, Default)]
pub struct BulkStats {
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_cancelled: AtomicU64,
    jobs_interrupted: AtomicU64,
    targets_aborted: AtomicU64,
    requests_submitted: AtomicU64,
    requests_completed: AtomicU64,
    requests_cancelled: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatsSnapshot {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub jobs_interrupted: u64,
    pub targets_aborted: u64,
    pub requests_submitted: u64,
    pub requests_completed: u64,
    pub requests_cancelled: u64,
}

impl BulkStats {
    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_cancelled(&self) {
        self.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn job_interrupted(&self) {
        self.jobs_interrupted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn target_aborted(&self) {
        self.targets_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_submitted(&self) {
        self.requests_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Relaxed),
            jobs_interrupted: self.jobs_interrupted.load(Ordering::Relaxed),
            targets_aborted: self.targets_aborted.load(Ordering::Relaxed),
            requests_submitted: self.requests_submitted.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.jobs_completed.store(0, Ordering::Relaxed);
        self.jobs_failed.store(0, Ordering::Relaxed);
        self.jobs_cancelled.store(0, Ordering::Relaxed);
        self.jobs_interrupted.store(0, Ordering::Relaxed);
        self.targets_aborted.store(0, Ordering::Relaxed);
        self.requests_submitted.store(0, Ordering::Relaxed);
        self.requests_completed.store(0, Ordering::Relaxed);
        self.requests_cancelled.store(0, Ordering::Relaxed);
    }
}
