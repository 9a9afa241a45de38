mod job_store;
mod request_store;

pub use job_store::{MemoryJobStore, MemoryStoreConfig};
pub use request_store::{MemoryRequestStore, TargetDisposition};
