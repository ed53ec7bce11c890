use rusqlite::{Connection, Result};
use std::collections::HashMap;

/// Current database schema version
const CURRENT_VERSION: u32 = 2;

/// Migration system for managing database schema versions
pub struct MigrationManager;

impl MigrationManager {
    /// Initialize the database with the current schema
    /// This creates the schema_version table and applies all migrations
    pub fn initialize(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )?;

        let current_version: u32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for version in (current_version + 1)..=CURRENT_VERSION {
            Self::apply_migration(conn, version)?;
        }

        Ok(())
    }

    /// Apply a specific migration by version number
    fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
        let migrations = get_migrations();
        if let Some(migration) = migrations.get(&version) {
            let tx = conn.unchecked_transaction()?;
            migration(&tx)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [version],
            )?;
            tx.commit()?;
            log::debug!("Applied schema migration v{}", version);
            Ok(())
        } else {
            Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
                Some(format!("No migration found for version {}", version)),
            ))
        }
    }

    /// Get the current schema version
    pub fn get_version(conn: &Connection) -> Result<u32> {
        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }
}

/// Get all migrations indexed by version
fn get_migrations() -> HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> {
    let mut migrations: HashMap<u32, fn(&rusqlite::Transaction) -> Result<(), rusqlite::Error>> = HashMap::new();
    migrations.insert(1, migration_v1);
    migrations.insert(2, migration_v2);
    migrations
}

/// Migration v1: Initial schema
fn migration_v1(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    // Projects table. kind='staging' marks a project retyped into a staging project;
    // staging_workflow_id is only ever set on staging projects.
    tx.execute(
        "CREATE TABLE projects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            kind TEXT NOT NULL DEFAULT 'standard' CHECK(kind IN ('standard','staging')),
            staging_workflow_id INTEGER NULL REFERENCES staging_workflows(id),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_projects_staging_workflow ON projects(staging_workflow_id)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE groups (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL UNIQUE,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            login TEXT NOT NULL UNIQUE,
            created_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE roles (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    for title in ["maintainer", "bugowner", "reviewer", "downloader", "reader"] {
        tx.execute("INSERT INTO roles (title) VALUES (?1)", [title])?;
    }

    // Relationships between projects and groups (role assignments)
    tx.execute(
        "CREATE TABLE relationships (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            group_id INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES roles(id),
            created_ts INTEGER NOT NULL,
            UNIQUE(project_id, group_id, role_id)
        )",
        [],
    )?;

    // One workflow per project
    tx.execute(
        "CREATE TABLE staging_workflows (
            id INTEGER PRIMARY KEY,
            project_id INTEGER NOT NULL UNIQUE REFERENCES projects(id),
            managers_group_id INTEGER NOT NULL REFERENCES groups(id),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;

    tx.execute(
        "CREATE TABLE bs_requests (
            id INTEGER PRIMARY KEY,
            description TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL CHECK(state IN ('new','review','accepted','declined','superseded','revoked')),
            target_project_id INTEGER NOT NULL REFERENCES projects(id),
            staging_project_id INTEGER NULL REFERENCES projects(id),
            creator TEXT NOT NULL,
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_bs_requests_target_state ON bs_requests(target_project_id, state)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_bs_requests_staging_project ON bs_requests(staging_project_id)",
        [],
    )?;

    // Reviews: by_group/by_user name the assignee, user_id the author
    tx.execute(
        "CREATE TABLE reviews (
            id INTEGER PRIMARY KEY,
            bs_request_id INTEGER NOT NULL REFERENCES bs_requests(id) ON DELETE CASCADE,
            state TEXT NOT NULL CHECK(state IN ('new','accepted','declined')),
            by_group TEXT NULL,
            by_user TEXT NULL,
            user_id INTEGER NULL REFERENCES users(id),
            created_ts INTEGER NOT NULL,
            modified_ts INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute(
        "CREATE INDEX idx_reviews_request_state ON reviews(bs_request_id, state)",
        [],
    )?;

    tx.execute(
        "CREATE TABLE staging_request_exclusions (
            id INTEGER PRIMARY KEY,
            staging_workflow_id INTEGER NOT NULL REFERENCES staging_workflows(id),
            bs_request_id INTEGER NOT NULL REFERENCES bs_requests(id) ON DELETE CASCADE,
            description TEXT NULL,
            created_ts INTEGER NOT NULL,
            UNIQUE(staging_workflow_id, bs_request_id)
        )",
        [],
    )?;

    Ok(())
}

/// Migration v2: directory versioning for the group/user cache
fn migration_v2(tx: &rusqlite::Transaction) -> Result<(), rusqlite::Error> {
    tx.execute(
        "CREATE TABLE metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;
    // Distinguishes cache entries of different databases within one process
    tx.execute(
        "INSERT INTO metadata (key, value) VALUES ('database_token', ?1)",
        [uuid::Uuid::new_v4().to_string()],
    )?;

    tx.execute(
        "CREATE TABLE directory_version (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            version INTEGER NOT NULL
        )",
        [],
    )?;
    tx.execute("INSERT INTO directory_version (id, version) VALUES (1, 0)", [])?;

    for table in ["groups", "users"] {
        for event in ["INSERT", "UPDATE", "DELETE"] {
            tx.execute(
                &format!(
                    "CREATE TRIGGER trg_{table}_{event_lower} AFTER {event} ON {table}
                     BEGIN
                        UPDATE directory_version SET version = version + 1 WHERE id = 1;
                     END",
                    table = table,
                    event = event,
                    event_lower = event.to_lowercase(),
                ),
                [],
            )?;
        }
    }

    Ok(())
}
