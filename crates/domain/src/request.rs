use crate::ids::RequestId;

/// Authorization context resolved for a request before submission.
///
/// Opaque to the orchestration core; carried so the job runtime can enforce
/// it when touching targets.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Restriction(String);

impl Restriction {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Restriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bulk file-operation request as handed to the orchestrator.
///
/// `subject` and `restriction` must be resolved upstream; the orchestrator
/// treats their absence at submission as a logic error.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BulkRequest {
    pub id: RequestId,
    /// Owner identity, used for cancel/clear authorization.
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub restriction: Option<Restriction>,
    /// Activity slug applied to each leaf target (delete, pin, ...).
    pub activity: String,
    /// Initial targets the root job enumerates.
    #[serde(default)]
    pub targets: Vec<String>,
    /// Cascade cancellation to sibling jobs when one job fails.
    #[serde(default)]
    pub cancel_on_failure: bool,
}
