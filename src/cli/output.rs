// Output formatting utilities

use crate::models::{BsRequest, Group, Project, StagingProject, User};
use crate::staging::WorkflowDocument;
use anyhow::Result;
use serde::Serialize;
use std::io::IsTerminal;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";

/// Bold header line when writing to a terminal
fn header(text: &str) -> String {
    if std::io::stdout().is_terminal() {
        format!("{}{}{}", ANSI_BOLD, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

fn id_or_unknown(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Pretty JSON for `--json` output
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn format_project_table(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects found.".to_string();
    }
    let mut lines = vec![
        header(&format!("{:<6} {:<40} {:<10} {:<8}", "ID", "Name", "Kind", "Workflow")),
        "-".repeat(67),
    ];
    for project in projects {
        let workflow = project
            .staging_workflow_id()
            .map(|id| id.to_string())
            .unwrap_or_default();
        lines.push(format!(
            "{:<6} {:<40} {:<10} {:<8}",
            id_or_unknown(project.id),
            project.name,
            project.kind.as_str(),
            workflow
        ));
    }
    lines.join("\n")
}

pub fn format_group_table(groups: &[Group]) -> String {
    if groups.is_empty() {
        return "No groups found.".to_string();
    }
    let mut lines = vec![header(&format!("{:<6} {}", "ID", "Title")), "-".repeat(46)];
    for group in groups {
        lines.push(format!("{:<6} {}", id_or_unknown(group.id), group.title));
    }
    lines.join("\n")
}

pub fn format_user_table(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }
    let mut lines = vec![header(&format!("{:<6} {}", "ID", "Login")), "-".repeat(46)];
    for user in users {
        lines.push(format!("{:<6} {}", id_or_unknown(user.id), user.login));
    }
    lines.join("\n")
}

/// Request table; `staging_name` resolves staging project ids to names
pub fn format_request_table(requests: &[BsRequest], staging_name: impl Fn(i64) -> Option<String>) -> String {
    if requests.is_empty() {
        return "No requests found.".to_string();
    }
    let mut lines = vec![
        header(&format!("{:<6} {:<11} {:<28} {:<12} {}", "ID", "State", "Staged in", "Creator", "Description")),
        "-".repeat(90),
    ];
    for request in requests {
        let staged = request
            .staging_project_id
            .map(|id| staging_name(id).unwrap_or_else(|| id.to_string()))
            .unwrap_or_default();
        lines.push(format!(
            "{:<6} {:<11} {:<28} {:<12} {}",
            id_or_unknown(request.id),
            request.state.as_str(),
            staged,
            request.creator,
            request.description
        ));
    }
    lines.join("\n")
}

pub fn format_staging_projects(projects: &[StagingProject]) -> String {
    if projects.is_empty() {
        return "No staging projects found.".to_string();
    }
    let mut lines = vec![header(&format!("{:<6} {}", "ID", "Staging project")), "-".repeat(46)];
    for project in projects {
        lines.push(format!("{:<6} {}", project.project_id, project.name));
    }
    lines.join("\n")
}

/// Human-readable summary of a rendered workflow
pub fn format_workflow_summary(document: &WorkflowDocument) -> String {
    let mut lines = vec![
        format!("{:<18} {}", "Project:", document.project),
        format!("{:<18} {}", "Managers group:", document.managers),
        String::new(),
        header("Staging projects"),
    ];
    if document.staging_projects.is_empty() {
        lines.push("  (none)".to_string());
    }
    for project in &document.staging_projects {
        let staged = if project.staged_requests.is_empty() {
            "empty".to_string()
        } else {
            project
                .staged_requests
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        lines.push(format!("  {:<40} {}", project.name, staged));
    }

    lines.push(String::new());
    lines.push(header("Excluded requests"));
    if document.excluded_requests.is_empty() {
        lines.push("  (none)".to_string());
    }
    for excluded in &document.excluded_requests {
        match &excluded.description {
            Some(description) => lines.push(format!("  {:<6} {}", excluded.id, description)),
            None => lines.push(format!("  {}", excluded.id)),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RequestState;
    use crate::staging::{ExcludedRequestSummary, StagingProjectSummary};

    #[test]
    fn test_empty_tables() {
        assert_eq!(format_project_table(&[]), "No projects found.");
        assert_eq!(format_group_table(&[]), "No groups found.");
        assert_eq!(format_request_table(&[], |_| None), "No requests found.");
    }

    #[test]
    fn test_request_table_resolves_staging_names() {
        let mut request = BsRequest::new("Update gcc".to_string(), 1, "bob".to_string());
        request.id = Some(4);
        request.state = RequestState::Review;
        request.staging_project_id = Some(7);

        let table = format_request_table(&[request], |id| {
            (id == 7).then(|| "home:alice:Staging:A".to_string())
        });
        let row = table.lines().last().unwrap();
        assert!(row.starts_with("4 "));
        assert!(row.contains("review"));
        assert!(row.contains("home:alice:Staging:A"));
        assert!(row.ends_with("Update gcc"));
    }

    #[test]
    fn test_workflow_summary() {
        let document = WorkflowDocument {
            project: "home:alice".to_string(),
            managers: "staging-managers".to_string(),
            staging_projects: vec![
                StagingProjectSummary { name: "home:alice:Staging:A".to_string(), staged_requests: vec![3, 5] },
                StagingProjectSummary { name: "home:alice:Staging:B".to_string(), staged_requests: vec![] },
            ],
            excluded_requests: vec![ExcludedRequestSummary { id: 9, description: Some("needs rebase".to_string()) }],
        };

        let summary = format_workflow_summary(&document);
        assert!(summary.contains("staging-managers"));
        assert!(summary.contains("3, 5"));
        assert!(summary.contains("empty"));
        assert!(summary.contains("needs rebase"));
    }
}
