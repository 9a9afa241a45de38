pub mod error;
pub mod ids;
pub mod job;
pub mod key;
pub mod request;
pub mod state;

pub use error::DomainError;
pub use ids::{JobId, RequestId};
pub use job::{Job, JobKind};
pub use key::JobKey;
pub use request::{BulkRequest, Restriction};
pub use state::{JobState, RequestStatus};
