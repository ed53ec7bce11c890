use serde::{Deserialize, Serialize};
use crate::staging::StagingError;

/// Canonical representation of a staging workflow
///
/// Served to API consumers and written to the backend on sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub project: String,
    pub managers: String,
    pub staging_projects: Vec<StagingProjectSummary>,
    pub excluded_requests: Vec<ExcludedRequestSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingProjectSummary {
    pub name: String,
    pub staged_requests: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRequestSummary {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowDocument {
    pub fn to_json(&self) -> Result<String, StagingError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
