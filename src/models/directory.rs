use serde::{Deserialize, Serialize};

/// Group model (e.g. the managers group of a staging workflow)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Option<i64>,
    pub title: String,
    pub created_ts: i64,
}

/// User model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub login: String,
    pub created_ts: i64,
}

/// Role model; roles are seeded by the schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: i64,
    pub title: String,
}

/// Role assignment of a group on a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: Option<i64>,
    pub project_id: i64,
    pub group_id: i64,
    pub role_id: i64,
    pub created_ts: i64,
}

pub const ROLE_MAINTAINER: &str = "maintainer";
pub const ROLE_REVIEWER: &str = "reviewer";
