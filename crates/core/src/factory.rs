use bulkflow_domain::{BulkRequest, Job, JobKey};

/// Builds concrete jobs bound to an activity definition.
///
/// The factory owns target/attribute interpretation; the orchestrator only
/// routes the jobs it produces.
pub trait JobFactory: Send + Sync {
    /// The root job representing the entire request.
    fn create_request_job(&self, request: &BulkRequest) -> Job;

    /// A leaf job applying the request's activity to one target.
    fn create_single_target_job(
        &self,
        parent_key: &JobKey,
        target: &str,
        attributes: Option<serde_json::Value>,
    ) -> Job;

    /// A directory-expansion job enumerating one target's children.
    fn create_target_expansion_job(
        &self,
        parent_key: &JobKey,
        target: &str,
        attributes: Option<serde_json::Value>,
    ) -> Job;
}
