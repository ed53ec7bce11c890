use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{Group, User};
use anyhow::{Context, Result};

/// Group repository
pub struct GroupRepo;

/// User repository
pub struct UserRepo;

fn row_to_group(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: Some(row.get(0)?),
        title: row.get(1)?,
        created_ts: row.get(2)?,
    })
}

fn row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(row.get(0)?),
        login: row.get(1)?,
        created_ts: row.get(2)?,
    })
}

impl GroupRepo {
    /// Create a new group
    pub fn create(conn: &Connection, title: &str) -> Result<Group> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO groups (title, created_ts) VALUES (?1, ?2)",
            rusqlite::params![title, now],
        )
        .with_context(|| format!("Failed to create group: {}", title))?;

        Ok(Group {
            id: Some(conn.last_insert_rowid()),
            title: title.to_string(),
            created_ts: now,
        })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Group>> {
        let mut stmt = conn.prepare("SELECT id, title, created_ts FROM groups WHERE id = ?1")?;
        let group = stmt.query_row([id], row_to_group).optional()?;
        Ok(group)
    }

    pub fn get_by_title(conn: &Connection, title: &str) -> Result<Option<Group>> {
        let mut stmt = conn.prepare("SELECT id, title, created_ts FROM groups WHERE title = ?1")?;
        let group = stmt.query_row([title], row_to_group).optional()?;
        Ok(group)
    }

    /// List all groups ordered by title
    pub fn list(conn: &Connection) -> Result<Vec<Group>> {
        let mut stmt = conn.prepare("SELECT id, title, created_ts FROM groups ORDER BY title")?;
        let rows = stmt.query_map([], row_to_group)?;

        let mut groups = Vec::new();
        for row in rows {
            groups.push(row?);
        }
        Ok(groups)
    }

    /// Monotonic version of the group/user directory
    ///
    /// Bumped by triggers on every insert, update or delete of a group or user.
    pub fn directory_version(conn: &Connection) -> Result<i64> {
        conn.query_row(
            "SELECT version FROM directory_version WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .context("Failed to read directory version")
    }

    /// Random token identifying this database
    pub fn database_token(conn: &Connection) -> Result<String> {
        conn.query_row(
            "SELECT value FROM metadata WHERE key = 'database_token'",
            [],
            |row| row.get(0),
        )
        .context("Failed to read database token")
    }
}

impl UserRepo {
    /// Create a new user
    pub fn create(conn: &Connection, login: &str) -> Result<User> {
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO users (login, created_ts) VALUES (?1, ?2)",
            rusqlite::params![login, now],
        )
        .with_context(|| format!("Failed to create user: {}", login))?;

        Ok(User {
            id: Some(conn.last_insert_rowid()),
            login: login.to_string(),
            created_ts: now,
        })
    }

    pub fn get_by_login(conn: &Connection, login: &str) -> Result<Option<User>> {
        let mut stmt = conn.prepare("SELECT id, login, created_ts FROM users WHERE login = ?1")?;
        let user = stmt.query_row([login], row_to_user).optional()?;
        Ok(user)
    }

    /// Distinct users who authored a review on a request staged in one of `staging_project_ids`
    pub fn review_authors_for_staging_projects(conn: &Connection, staging_project_ids: &[i64]) -> Result<Vec<User>> {
        if staging_project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=staging_project_ids.len())
            .map(|i| format!("?{}", i))
            .collect();
        let sql = format!(
            "SELECT DISTINCT u.id, u.login, u.created_ts FROM users u
             JOIN reviews v ON v.user_id = u.id
             JOIN bs_requests r ON r.id = v.bs_request_id
             WHERE r.staging_project_id IN ({})
             ORDER BY u.login",
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(staging_project_ids), row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
