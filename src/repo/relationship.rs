use rusqlite::{Connection, OptionalExtension};
use crate::models::{Relationship, Role};
use anyhow::{Context, Result};

/// Role lookup
pub struct RoleRepo;

/// Role assignments of groups on projects
pub struct RelationshipRepo;

impl RoleRepo {
    pub fn find_by_title(conn: &Connection, title: &str) -> Result<Option<Role>> {
        let mut stmt = conn.prepare("SELECT id, title FROM roles WHERE title = ?1")?;
        let role = stmt
            .query_row([title], |row| {
                Ok(Role {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })
            .optional()?;
        Ok(role)
    }

    /// Like `find_by_title`, but a missing role is an error
    pub fn require(conn: &Connection, title: &str) -> Result<Role> {
        Self::find_by_title(conn, title)?
            .with_context(|| format!("Role '{}' not found", title))
    }
}

impl RelationshipRepo {
    /// Find the (project, group, role) relationship, creating it if missing
    pub fn find_or_create(conn: &Connection, project_id: i64, group_id: i64, role_id: i64) -> Result<Relationship> {
        conn.execute(
            "INSERT OR IGNORE INTO relationships (project_id, group_id, role_id, created_ts)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![project_id, group_id, role_id, chrono::Utc::now().timestamp()],
        )
        .with_context(|| format!(
            "Failed to create relationship project={} group={} role={}",
            project_id, group_id, role_id
        ))?;

        conn.query_row(
            "SELECT id, project_id, group_id, role_id, created_ts FROM relationships
             WHERE project_id = ?1 AND group_id = ?2 AND role_id = ?3",
            rusqlite::params![project_id, group_id, role_id],
            |row| {
                Ok(Relationship {
                    id: Some(row.get(0)?),
                    project_id: row.get(1)?,
                    group_id: row.get(2)?,
                    role_id: row.get(3)?,
                    created_ts: row.get(4)?,
                })
            },
        )
        .context("Failed to load relationship")
    }

    /// Remove the relationship if present; returns whether a row was removed
    pub fn remove(conn: &Connection, project_id: i64, group_id: i64, role_id: i64) -> Result<bool> {
        let removed = conn.execute(
            "DELETE FROM relationships WHERE project_id = ?1 AND group_id = ?2 AND role_id = ?3",
            rusqlite::params![project_id, group_id, role_id],
        )
        .with_context(|| format!(
            "Failed to remove relationship project={} group={} role={}",
            project_id, group_id, role_id
        ))?;
        Ok(removed > 0)
    }

    pub fn exists(conn: &Connection, project_id: i64, group_id: i64, role_id: i64) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM relationships WHERE project_id = ?1 AND group_id = ?2 AND role_id = ?3",
            rusqlite::params![project_id, group_id, role_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Group ids holding `role_id` on a project
    pub fn group_ids_with_role(conn: &Connection, project_id: i64, role_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT group_id FROM relationships WHERE project_id = ?1 AND role_id = ?2 ORDER BY group_id"
        )?;
        let rows = stmt.query_map([project_id, role_id], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}
