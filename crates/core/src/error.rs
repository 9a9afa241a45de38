use thiserror::Error;

use bulkflow_store::StoreError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("submit failed: {0}")]
    Submit(String),

    #[error("cancel failed: {0}")]
    Cancel(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Caller not authorized for cancel/clear; surfaced directly.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
