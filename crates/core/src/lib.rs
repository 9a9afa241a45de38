pub mod config;
pub mod error;
pub mod factory;
pub mod orchestrator;
pub mod queue;
pub mod stats;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{OrchestratorError, QueueError};
pub use factory::JobFactory;
pub use orchestrator::{CompletionHandler, JobSubmitter, RequestOrchestrator};
pub use queue::JobQueue;
pub use stats::{BulkStats, StatsSnapshot};
pub use tracker::DependencyTracker;
