// Error handling utilities for consistent error messages and exit codes

use crate::staging::StagingError;
use std::process;

/// Exit with a user error (exit code 1)
/// User errors are for invalid input, missing resources, etc.
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exit with an internal error (exit code >1)
/// Internal errors are for store failures, backend failures, etc.
pub fn internal_error(message: &str) -> ! {
    eprintln!("Internal error: {}", message);
    process::exit(2);
}

/// True if an error chain carries a staging error caused by operator input
pub fn is_user_facing(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StagingError>())
        .map_or(false, StagingError::is_user_error)
}

/// Validate that a string is not empty
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Validate that a request ID is valid (positive integer)
pub fn validate_request_id(id_str: &str) -> Result<i64, String> {
    id_str.parse::<i64>()
        .map_err(|_| format!("Invalid request ID: '{}'. Request ID must be a number.", id_str))
        .and_then(|id| {
            if id > 0 {
                Ok(id)
            } else {
                Err(format!("Invalid request ID: {}. Request ID must be positive.", id))
            }
        })
}

/// Validate project name format (alphanumeric, colons, dots, underscores, hyphens)
pub fn validate_project_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Project name cannot be empty".to_string());
    }
    if name.starts_with(':') || name.ends_with(':') || name.contains("::") {
        return Err(format!("Invalid project name: '{}'. Name segments cannot be empty.", name));
    }

    if name.chars().all(|c| c.is_alphanumeric() || c == ':' || c == '.' || c == '_' || c == '-') {
        Ok(())
    } else {
        Err(format!("Invalid project name: '{}'. Project names can only contain letters, numbers, colons, dots, underscores, and hyphens.", name))
    }
}

/// Validate group title or user login format
pub fn validate_principal_name(name: &str, kind: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} cannot be empty", kind));
    }

    if name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
        Ok(())
    } else {
        Err(format!("Invalid {}: '{}'. Only letters, numbers, underscores, hyphens, and dots are allowed.", kind.to_lowercase(), name))
    }
}
