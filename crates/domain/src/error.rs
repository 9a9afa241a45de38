/// Errors for domain schema validation.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("invalid request id: {0}")]
    InvalidRequestId(String),

    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },
}
