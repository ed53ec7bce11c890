use thiserror::Error;
use crate::backend::BackendError;

/// Errors raised by staging workflow operations
#[derive(Error, Debug)]
pub enum StagingError {
    /// Rejected before anything was written
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Managers group reassignment stopped at `project`; `completed` were already updated
    #[error("Failed to reassign managers group of staging project '{project}' ({} already updated)", .completed.len())]
    PartialReassignment {
        project: String,
        completed: Vec<String>,
        #[source]
        source: Box<StagingError>,
    },

    #[error("Failed to render staging workflow: {0}")]
    Render(#[from] serde_json::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl StagingError {
    pub fn validation(message: impl Into<String>) -> Self {
        StagingError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, name: impl ToString) -> Self {
        StagingError::NotFound {
            kind,
            name: name.to_string(),
        }
    }

    /// Errors caused by operator input rather than by the store or the backend
    pub fn is_user_error(&self) -> bool {
        matches!(self, StagingError::Validation(_) | StagingError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_partial_reassignment_reports_source() {
        let err = StagingError::PartialReassignment {
            project: "home:alice:Staging:B".to_string(),
            completed: vec!["home:alice:Staging:A".to_string()],
            source: Box::new(StagingError::not_found("Role", "maintainer")),
        };
        assert_eq!(
            err.to_string(),
            "Failed to reassign managers group of staging project 'home:alice:Staging:B' (1 already updated)"
        );
        assert_eq!(err.source().unwrap().to_string(), "Role 'maintainer' not found");
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_user_errors() {
        assert!(StagingError::validation("managers group is required").is_user_error());
        assert!(StagingError::not_found("Project", "home:alice").is_user_error());
        let backend = StagingError::from(BackendError::Unavailable("down".to_string()));
        assert!(!backend.is_user_error());
    }
}
