use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{Project, ProjectKind, StagingProject};
use anyhow::{Context, Result};

const PROJECT_COLUMNS: &str = "id, name, kind, staging_workflow_id, created_ts, modified_ts";

/// Project repository for database operations
///
/// Manages projects with support for:
/// - Creating projects and find-or-create by name
/// - Retyping a project into a staging project
/// - Assigning and detaching the owning staging workflow
///
/// # Staging projects
///
/// A staging project is an ordinary project row with `kind = 'staging'`. The
/// owning workflow is stored on the row itself, so a staging project can never
/// belong to two workflows at once.
///
/// # Example
///
/// ```no_run
/// use stager::db::DbConnection;
/// use stager::repo::ProjectRepo;
///
/// let conn = DbConnection::connect().unwrap();
/// let project = ProjectRepo::find_or_create_by_name(&conn, "home:alice:Staging:A").unwrap();
/// let staging = ProjectRepo::retype_as_staging(&conn, &project).unwrap();
/// ```
pub struct ProjectRepo;

fn row_to_project(row: &Row) -> rusqlite::Result<Project> {
    let kind: String = row.get(2)?;
    let workflow_id: Option<i64> = row.get(3)?;
    let kind = ProjectKind::from_columns(&kind, workflow_id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("Invalid project kind: {}", kind).into(),
        )
    })?;
    Ok(Project {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        kind,
        created_ts: row.get(4)?,
        modified_ts: row.get(5)?,
    })
}

fn row_to_staging_project(row: &Row) -> rusqlite::Result<StagingProject> {
    Ok(StagingProject {
        project_id: row.get(0)?,
        name: row.get(1)?,
        staging_workflow_id: row.get(2)?,
    })
}

impl ProjectRepo {
    /// Create a new standard project
    pub fn create(conn: &Connection, name: &str) -> Result<Project> {
        let project = Project::new(name.to_string());

        conn.execute(
            "INSERT INTO projects (name, kind, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                project.name,
                project.kind.as_str(),
                project.created_ts,
                project.modified_ts
            ],
        )
        .with_context(|| format!("Failed to create project: {}", name))?;

        let id = conn.last_insert_rowid();
        Ok(Project {
            id: Some(id),
            ..project
        })
    }

    /// Get project by ID
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Project>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM projects WHERE id = ?1",
            PROJECT_COLUMNS
        ))?;
        let project = stmt.query_row([id], row_to_project).optional()?;
        Ok(project)
    }

    /// Get project by name
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Project>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM projects WHERE name = ?1",
            PROJECT_COLUMNS
        ))?;
        let project = stmt.query_row([name], row_to_project).optional()?;
        Ok(project)
    }

    /// Get the project named `name`, creating it if it does not exist yet
    pub fn find_or_create_by_name(conn: &Connection, name: &str) -> Result<Project> {
        match Self::get_by_name(conn, name)? {
            Some(project) => Ok(project),
            None => Self::create(conn, name),
        }
    }

    /// List all projects ordered by name
    pub fn list(conn: &Connection) -> Result<Vec<Project>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM projects ORDER BY name",
            PROJECT_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_project)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Retype a project into a staging project
    ///
    /// Standard projects become unowned staging projects. Projects that are
    /// already staging projects keep their current owner.
    pub fn retype_as_staging(conn: &Connection, project: &Project) -> Result<StagingProject> {
        let id = project.id.context("Cannot retype an unsaved project")?;

        if !project.kind.is_staging() {
            conn.execute(
                "UPDATE projects SET kind = 'staging', modified_ts = ?1 WHERE id = ?2",
                rusqlite::params![chrono::Utc::now().timestamp(), id],
            )
            .with_context(|| format!("Failed to retype project '{}' as staging project", project.name))?;
        }

        Ok(StagingProject {
            project_id: id,
            name: project.name.clone(),
            staging_workflow_id: project.staging_workflow_id(),
        })
    }

    /// Get a staging project by name; standard projects yield `None`
    pub fn get_staging_by_name(conn: &Connection, name: &str) -> Result<Option<StagingProject>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, staging_workflow_id FROM projects
             WHERE name = ?1 AND kind = 'staging'"
        )?;
        let project = stmt.query_row([name], row_to_staging_project).optional()?;
        Ok(project)
    }

    /// Set (or clear) the owning workflow of a staging project
    pub fn set_staging_workflow(conn: &Connection, project_id: i64, workflow_id: Option<i64>) -> Result<()> {
        let updated = conn.execute(
            "UPDATE projects SET staging_workflow_id = ?1, modified_ts = ?2
             WHERE id = ?3 AND kind = 'staging'",
            rusqlite::params![workflow_id, chrono::Utc::now().timestamp(), project_id],
        )
        .with_context(|| format!("Failed to set staging workflow of project {}", project_id))?;

        if updated == 0 {
            anyhow::bail!("Staging project {} not found", project_id);
        }
        Ok(())
    }

    /// Persist a project without other changes (bumps modified_ts)
    pub fn touch(conn: &Connection, project_id: i64) -> Result<()> {
        let updated = conn.execute(
            "UPDATE projects SET modified_ts = ?1 WHERE id = ?2",
            rusqlite::params![chrono::Utc::now().timestamp(), project_id],
        )
        .with_context(|| format!("Failed to store project {}", project_id))?;

        if updated == 0 {
            anyhow::bail!("Project {} not found", project_id);
        }
        Ok(())
    }

    /// Staging projects owned by a workflow, ordered by name
    pub fn staging_projects_for_workflow(conn: &Connection, workflow_id: i64) -> Result<Vec<StagingProject>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, staging_workflow_id FROM projects
             WHERE staging_workflow_id = ?1 ORDER BY name"
        )?;
        let rows = stmt.query_map([workflow_id], row_to_staging_project)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Staging projects of a workflow that have no request staged in them
    pub fn staging_projects_without_requests(conn: &Connection, workflow_id: i64) -> Result<Vec<StagingProject>> {
        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.staging_workflow_id FROM projects p
             LEFT OUTER JOIN bs_requests r ON r.staging_project_id = p.id
             WHERE p.staging_workflow_id = ?1 AND r.id IS NULL
             ORDER BY p.name"
        )?;
        let rows = stmt.query_map([workflow_id], row_to_staging_project)?;

        let mut projects = Vec::new();
        for row in rows {
            projects.push(row?);
        }
        Ok(projects)
    }

    /// Clear the owner of every staging project of a workflow
    ///
    /// Returns the number of detached projects.
    pub fn detach_workflow(conn: &Connection, workflow_id: i64) -> Result<usize> {
        let detached = conn.execute(
            "UPDATE projects SET staging_workflow_id = NULL, modified_ts = ?1
             WHERE staging_workflow_id = ?2",
            rusqlite::params![chrono::Utc::now().timestamp(), workflow_id],
        )
        .with_context(|| format!("Failed to detach staging projects of workflow {}", workflow_id))?;
        Ok(detached)
    }
}
