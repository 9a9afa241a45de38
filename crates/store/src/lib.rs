mod error;
mod store;

pub use error::StoreError;
pub use store::{JobFilter, JobStore, RequestStore};
