use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{RequestExclusion, StagingWorkflow};
use anyhow::{Context, Result};

/// Staging workflow repository
pub struct WorkflowRepo;

/// Request exclusion repository
pub struct ExclusionRepo;

fn row_to_workflow(row: &Row) -> rusqlite::Result<StagingWorkflow> {
    Ok(StagingWorkflow {
        id: Some(row.get(0)?),
        project_id: row.get(1)?,
        managers_group_id: row.get(2)?,
        created_ts: row.get(3)?,
        modified_ts: row.get(4)?,
    })
}

fn row_to_exclusion(row: &Row) -> rusqlite::Result<RequestExclusion> {
    Ok(RequestExclusion {
        id: Some(row.get(0)?),
        staging_workflow_id: row.get(1)?,
        bs_request_id: row.get(2)?,
        description: row.get(3)?,
        created_ts: row.get(4)?,
    })
}

impl WorkflowRepo {
    /// Insert a new workflow row
    pub fn insert(conn: &Connection, workflow: &StagingWorkflow) -> Result<StagingWorkflow> {
        conn.execute(
            "INSERT INTO staging_workflows (project_id, managers_group_id, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                workflow.project_id,
                workflow.managers_group_id,
                workflow.created_ts,
                workflow.modified_ts
            ],
        )
        .with_context(|| format!("Failed to create staging workflow for project {}", workflow.project_id))?;

        Ok(StagingWorkflow {
            id: Some(conn.last_insert_rowid()),
            ..workflow.clone()
        })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<StagingWorkflow>> {
        let mut stmt = conn.prepare(
            "SELECT id, project_id, managers_group_id, created_ts, modified_ts
             FROM staging_workflows WHERE id = ?1"
        )?;
        let workflow = stmt.query_row([id], row_to_workflow).optional()?;
        Ok(workflow)
    }

    pub fn get_by_project(conn: &Connection, project_id: i64) -> Result<Option<StagingWorkflow>> {
        let mut stmt = conn.prepare(
            "SELECT id, project_id, managers_group_id, created_ts, modified_ts
             FROM staging_workflows WHERE project_id = ?1"
        )?;
        let workflow = stmt.query_row([project_id], row_to_workflow).optional()?;
        Ok(workflow)
    }

    /// Persist a new managers group; returns the new modified_ts
    pub fn update_managers_group(conn: &Connection, id: i64, managers_group_id: i64) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE staging_workflows SET managers_group_id = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![managers_group_id, now, id],
        )
        .with_context(|| format!("Failed to update managers group of staging workflow {}", id))?;

        if updated == 0 {
            anyhow::bail!("Staging workflow {} not found", id);
        }
        Ok(now)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        let deleted = conn.execute("DELETE FROM staging_workflows WHERE id = ?1", [id])
            .with_context(|| format!("Failed to delete staging workflow {}", id))?;

        if deleted == 0 {
            anyhow::bail!("Staging workflow {} not found", id);
        }
        Ok(())
    }
}

impl ExclusionRepo {
    /// Exclude a request from a workflow
    pub fn create(
        conn: &Connection,
        workflow_id: i64,
        bs_request_id: i64,
        description: Option<&str>,
    ) -> Result<RequestExclusion> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO staging_request_exclusions (staging_workflow_id, bs_request_id, description, created_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![workflow_id, bs_request_id, description, now],
        )
        .with_context(|| format!("Failed to exclude request {} from staging workflow {}", bs_request_id, workflow_id))?;

        Ok(RequestExclusion {
            id: Some(conn.last_insert_rowid()),
            staging_workflow_id: workflow_id,
            bs_request_id,
            description: description.map(str::to_string),
            created_ts: now,
        })
    }

    pub fn get(conn: &Connection, workflow_id: i64, bs_request_id: i64) -> Result<Option<RequestExclusion>> {
        let mut stmt = conn.prepare(
            "SELECT id, staging_workflow_id, bs_request_id, description, created_ts
             FROM staging_request_exclusions
             WHERE staging_workflow_id = ?1 AND bs_request_id = ?2"
        )?;
        let exclusion = stmt.query_row([workflow_id, bs_request_id], row_to_exclusion).optional()?;
        Ok(exclusion)
    }

    /// Remove an exclusion; returns whether one existed
    pub fn delete(conn: &Connection, workflow_id: i64, bs_request_id: i64) -> Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM staging_request_exclusions WHERE staging_workflow_id = ?1 AND bs_request_id = ?2",
            [workflow_id, bs_request_id],
        )
        .with_context(|| format!("Failed to remove exclusion of request {}", bs_request_id))?;
        Ok(deleted > 0)
    }

    /// Remove all exclusions of a workflow; returns the number removed
    pub fn delete_for_workflow(conn: &Connection, workflow_id: i64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM staging_request_exclusions WHERE staging_workflow_id = ?1",
            [workflow_id],
        )
        .with_context(|| format!("Failed to remove exclusions of staging workflow {}", workflow_id))?;
        Ok(deleted)
    }

    pub fn list_for_workflow(conn: &Connection, workflow_id: i64) -> Result<Vec<RequestExclusion>> {
        let mut stmt = conn.prepare(
            "SELECT id, staging_workflow_id, bs_request_id, description, created_ts
             FROM staging_request_exclusions
             WHERE staging_workflow_id = ?1 ORDER BY bs_request_id"
        )?;
        let rows = stmt.query_map([workflow_id], row_to_exclusion)?;

        let mut exclusions = Vec::new();
        for row in rows {
            exclusions.push(row?);
        }
        Ok(exclusions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::repo::{GroupRepo, ProjectRepo, RequestRepo};

    fn setup(conn: &Connection) -> StagingWorkflow {
        let project = ProjectRepo::create(conn, "home:alice").unwrap();
        let group = GroupRepo::create(conn, "managers").unwrap();
        WorkflowRepo::insert(conn, &StagingWorkflow::new(project.id.unwrap(), group.id.unwrap())).unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let workflow = setup(&conn);

        let by_id = WorkflowRepo::get_by_id(&conn, workflow.id.unwrap()).unwrap().unwrap();
        assert_eq!(by_id, workflow);
        let by_project = WorkflowRepo::get_by_project(&conn, workflow.project_id).unwrap().unwrap();
        assert_eq!(by_project.id, workflow.id);
    }

    #[test]
    fn test_one_workflow_per_project() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let workflow = setup(&conn);

        let duplicate = StagingWorkflow::new(workflow.project_id, workflow.managers_group_id);
        assert!(WorkflowRepo::insert(&conn, &duplicate).is_err());
    }

    #[test]
    fn test_managers_group_must_exist() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let project = ProjectRepo::create(&conn, "home:alice").unwrap();

        let result = WorkflowRepo::insert(&conn, &StagingWorkflow::new(project.id.unwrap(), 999));
        assert!(result.is_err());
    }

    #[test]
    fn test_exclusions_roundtrip() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let workflow = setup(&conn);
        let wid = workflow.id.unwrap();
        let request = RequestRepo::create(&conn, workflow.project_id, "Update gcc", "bob").unwrap();
        let rid = request.id.unwrap();

        ExclusionRepo::create(&conn, wid, rid, Some("breaks the build")).unwrap();
        assert!(ExclusionRepo::create(&conn, wid, rid, None).is_err());

        let listed = ExclusionRepo::list_for_workflow(&conn, wid).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description.as_deref(), Some("breaks the build"));

        assert!(ExclusionRepo::delete(&conn, wid, rid).unwrap());
        assert!(ExclusionRepo::get(&conn, wid, rid).unwrap().is_none());
    }

    #[test]
    fn test_delete_workflow() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let workflow = setup(&conn);
        let wid = workflow.id.unwrap();

        WorkflowRepo::delete(&conn, wid).unwrap();
        assert!(WorkflowRepo::get_by_id(&conn, wid).unwrap().is_none());
        assert!(WorkflowRepo::delete(&conn, wid).is_err());
    }
}
