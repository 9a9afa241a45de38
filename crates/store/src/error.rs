use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    /// The request was cleared concurrently. Orchestration logic treats this
    /// as an accepted race, not a failure.
    #[error("request not found: {0}")]
    NotFound(String),

    #[error("registry at capacity ({limit} jobs)")]
    Capacity { limit: usize },

    #[error("{0}")]
    Other(String),
}
