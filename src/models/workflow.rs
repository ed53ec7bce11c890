use serde::{Deserialize, Serialize};

/// Staging workflow attached to a project
///
/// `managers_group_id` is not optional: a workflow cannot exist without a
/// managers group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingWorkflow {
    pub id: Option<i64>,
    pub project_id: i64,
    pub managers_group_id: i64,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl StagingWorkflow {
    pub fn new(project_id: i64, managers_group_id: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            project_id,
            managers_group_id,
            created_ts: now,
            modified_ts: now,
        }
    }
}

/// A project retyped into a staging project
///
/// Wraps the generic project by id; ownership lives on the project row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingProject {
    pub project_id: i64,
    pub name: String,
    pub staging_workflow_id: Option<i64>,
}

impl StagingProject {
    /// True if owned by a workflow other than `workflow_id`
    pub fn owned_by_other(&self, workflow_id: i64) -> bool {
        matches!(self.staging_workflow_id, Some(owner) if owner != workflow_id)
    }
}

/// A request explicitly excluded from staging by an operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestExclusion {
    pub id: Option<i64>,
    pub staging_workflow_id: i64,
    pub bs_request_id: i64,
    pub description: Option<String>,
    pub created_ts: i64,
}
