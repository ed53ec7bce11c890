use serde::{Deserialize, Serialize};

/// Project kind
///
/// A project starts out `Standard`. Staging projects are retyped in place and
/// carry the id of the workflow that owns them, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProjectKind {
    Standard,
    Staging { workflow_id: Option<i64> },
}

impl ProjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectKind::Standard => "standard",
            ProjectKind::Staging { .. } => "staging",
        }
    }

    /// Build from the stored `kind` column and `staging_workflow_id` column
    pub fn from_columns(kind: &str, workflow_id: Option<i64>) -> Option<Self> {
        match kind {
            "standard" => Some(ProjectKind::Standard),
            "staging" => Some(ProjectKind::Staging { workflow_id }),
            _ => None,
        }
    }

    pub fn is_staging(&self) -> bool {
        matches!(self, ProjectKind::Staging { .. })
    }
}

/// Project model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Option<i64>,
    pub name: String,
    pub kind: ProjectKind,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl Project {
    /// Create a new standard project
    pub fn new(name: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            name,
            kind: ProjectKind::Standard,
            created_ts: now,
            modified_ts: now,
        }
    }

    /// Owning workflow, for staging projects
    pub fn staging_workflow_id(&self) -> Option<i64> {
        match self.kind {
            ProjectKind::Staging { workflow_id } => workflow_id,
            ProjectKind::Standard => None,
        }
    }
}

/// Name of the staging project for `letter` under `parent`
pub fn staging_project_name(parent: &str, letter: char) -> String {
    format!("{}:Staging:{}", parent, letter)
}
