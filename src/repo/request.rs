use rusqlite::{Connection, OptionalExtension, Row};
use crate::models::{BsRequest, RequestState, Review, ReviewState};
use anyhow::{Context, Result};

const REQUEST_COLUMNS: &str =
    "r.id, r.description, r.state, r.target_project_id, r.staging_project_id, r.creator, r.created_ts, r.modified_ts";

/// Build request repository
///
/// Requests are owned by the request workflow outside this crate; the staging
/// core only reads them, except for assigning or clearing the staging project.
pub struct RequestRepo;

/// Review repository
pub struct ReviewRepo;

fn row_to_request(row: &Row) -> rusqlite::Result<BsRequest> {
    let state: String = row.get(2)?;
    let state = RequestState::from_str(&state).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("Invalid request state: {}", state).into(),
        )
    })?;
    Ok(BsRequest {
        id: Some(row.get(0)?),
        description: row.get(1)?,
        state,
        target_project_id: row.get(3)?,
        staging_project_id: row.get(4)?,
        creator: row.get(5)?,
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

fn row_to_review(row: &Row) -> rusqlite::Result<Review> {
    let state: String = row.get(2)?;
    let state = ReviewState::from_str(&state).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("Invalid review state: {}", state).into(),
        )
    })?;
    Ok(Review {
        id: Some(row.get(0)?),
        bs_request_id: row.get(1)?,
        state,
        by_group: row.get(3)?,
        by_user: row.get(4)?,
        user_id: row.get(5)?,
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

fn collect_requests(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<BsRequest>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, row_to_request)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

impl RequestRepo {
    /// Create a new request in the `new` state
    pub fn create(conn: &Connection, target_project_id: i64, description: &str, creator: &str) -> Result<BsRequest> {
        let request = BsRequest::new(description.to_string(), target_project_id, creator.to_string());

        conn.execute(
            "INSERT INTO bs_requests (description, state, target_project_id, staging_project_id, creator, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6)",
            rusqlite::params![
                request.description,
                request.state.as_str(),
                request.target_project_id,
                request.creator,
                request.created_ts,
                request.modified_ts
            ],
        )
        .with_context(|| format!("Failed to create request targeting project {}", target_project_id))?;

        Ok(BsRequest {
            id: Some(conn.last_insert_rowid()),
            ..request
        })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<BsRequest>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bs_requests r WHERE r.id = ?1",
            REQUEST_COLUMNS
        ))?;
        let request = stmt.query_row([id], row_to_request).optional()?;
        Ok(request)
    }

    pub fn set_state(conn: &Connection, id: i64, state: RequestState) -> Result<()> {
        let updated = conn.execute(
            "UPDATE bs_requests SET state = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![state.as_str(), chrono::Utc::now().timestamp(), id],
        )
        .with_context(|| format!("Failed to set state of request {}", id))?;

        if updated == 0 {
            anyhow::bail!("Request {} not found", id);
        }
        Ok(())
    }

    /// Assign (or clear) the staging project of a request
    pub fn set_staging_project(conn: &Connection, id: i64, staging_project_id: Option<i64>) -> Result<()> {
        let updated = conn.execute(
            "UPDATE bs_requests SET staging_project_id = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![staging_project_id, chrono::Utc::now().timestamp(), id],
        )
        .with_context(|| format!("Failed to set staging project of request {}", id))?;

        if updated == 0 {
            anyhow::bail!("Request {} not found", id);
        }
        Ok(())
    }

    /// All requests targeting a project
    pub fn list_for_target(conn: &Connection, target_project_id: i64) -> Result<Vec<BsRequest>> {
        collect_requests(
            conn,
            &format!(
                "SELECT {} FROM bs_requests r WHERE r.target_project_id = ?1 ORDER BY r.id",
                REQUEST_COLUMNS
            ),
            [target_project_id],
        )
    }

    /// Requests targeting a project in the given overall state
    pub fn in_state_for_target(conn: &Connection, target_project_id: i64, state: RequestState) -> Result<Vec<BsRequest>> {
        collect_requests(
            conn,
            &format!(
                "SELECT {} FROM bs_requests r
                 WHERE r.target_project_id = ?1 AND r.state = ?2
                 ORDER BY r.id",
                REQUEST_COLUMNS
            ),
            rusqlite::params![target_project_id, state.as_str()],
        )
    }

    /// Unstaged requests in review targeting a project with a new review by `group_title`
    pub fn in_review_by_group(conn: &Connection, target_project_id: i64, group_title: &str) -> Result<Vec<BsRequest>> {
        collect_requests(
            conn,
            &format!(
                "SELECT DISTINCT {} FROM bs_requests r
                 JOIN reviews v ON v.bs_request_id = r.id
                 WHERE r.target_project_id = ?1
                   AND r.state = 'review'
                   AND r.staging_project_id IS NULL
                   AND v.state = 'new'
                   AND v.by_group = ?2
                 ORDER BY r.id",
                REQUEST_COLUMNS
            ),
            rusqlite::params![target_project_id, group_title],
        )
    }

    /// Requests excluded from a staging workflow
    pub fn excluded_from_workflow(conn: &Connection, workflow_id: i64) -> Result<Vec<BsRequest>> {
        collect_requests(
            conn,
            &format!(
                "SELECT {} FROM bs_requests r
                 JOIN staging_request_exclusions e ON e.bs_request_id = r.id
                 WHERE e.staging_workflow_id = ?1
                 ORDER BY r.id",
                REQUEST_COLUMNS
            ),
            [workflow_id],
        )
    }

    /// Requests staged in any of the given staging projects
    pub fn staged_in(conn: &Connection, staging_project_ids: &[i64]) -> Result<Vec<BsRequest>> {
        if staging_project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders: Vec<String> = (1..=staging_project_ids.len())
            .map(|i| format!("?{}", i))
            .collect();
        collect_requests(
            conn,
            &format!(
                "SELECT {} FROM bs_requests r WHERE r.staging_project_id IN ({}) ORDER BY r.id",
                REQUEST_COLUMNS,
                placeholders.join(", ")
            ),
            rusqlite::params_from_iter(staging_project_ids),
        )
    }
}

impl ReviewRepo {
    /// Add a new review to a request
    pub fn create(
        conn: &Connection,
        bs_request_id: i64,
        by_group: Option<&str>,
        by_user: Option<&str>,
        author_id: Option<i64>,
    ) -> Result<Review> {
        if by_group.is_none() && by_user.is_none() {
            anyhow::bail!("A review must be assigned to a group or a user");
        }
        let now = chrono::Utc::now().timestamp();

        conn.execute(
            "INSERT INTO reviews (bs_request_id, state, by_group, by_user, user_id, created_ts, modified_ts)
             VALUES (?1, 'new', ?2, ?3, ?4, ?5, ?5)",
            rusqlite::params![bs_request_id, by_group, by_user, author_id, now],
        )
        .with_context(|| format!("Failed to add review to request {}", bs_request_id))?;

        Ok(Review {
            id: Some(conn.last_insert_rowid()),
            bs_request_id,
            state: ReviewState::New,
            by_group: by_group.map(str::to_string),
            by_user: by_user.map(str::to_string),
            user_id: author_id,
            created_ts: now,
            modified_ts: now,
        })
    }

    pub fn set_state(conn: &Connection, id: i64, state: ReviewState) -> Result<()> {
        let updated = conn.execute(
            "UPDATE reviews SET state = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![state.as_str(), chrono::Utc::now().timestamp(), id],
        )
        .with_context(|| format!("Failed to set state of review {}", id))?;

        if updated == 0 {
            anyhow::bail!("Review {} not found", id);
        }
        Ok(())
    }

    pub fn list_for_request(conn: &Connection, bs_request_id: i64) -> Result<Vec<Review>> {
        let mut stmt = conn.prepare(
            "SELECT id, bs_request_id, state, by_group, by_user, user_id, created_ts, modified_ts
             FROM reviews WHERE bs_request_id = ?1 ORDER BY id"
        )?;
        let rows = stmt.query_map([bs_request_id], row_to_review)?;

        let mut reviews = Vec::new();
        for row in rows {
            reviews.push(row?);
        }
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::repo::ProjectRepo;

    #[test]
    fn test_create_and_get_request() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let project = ProjectRepo::create(&conn, "home:alice").unwrap();

        let request = RequestRepo::create(&conn, project.id.unwrap(), "Update gcc", "bob").unwrap();
        let loaded = RequestRepo::get_by_id(&conn, request.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.description, "Update gcc");
        assert_eq!(loaded.state, RequestState::New);
        assert_eq!(loaded.creator, "bob");
    }

    #[test]
    fn test_in_review_by_group_filters() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let project = ProjectRepo::create(&conn, "home:alice").unwrap();
        let other = ProjectRepo::create(&conn, "home:bob").unwrap();
        let pid = project.id.unwrap();

        // Matches: review state, new review by the group, unstaged
        let matching = RequestRepo::create(&conn, pid, "matching", "bob").unwrap();
        RequestRepo::set_state(&conn, matching.id.unwrap(), RequestState::Review).unwrap();
        ReviewRepo::create(&conn, matching.id.unwrap(), Some("managers"), None, None).unwrap();
        ReviewRepo::create(&conn, matching.id.unwrap(), None, Some("carol"), None).unwrap();

        // Review accepted already
        let accepted = RequestRepo::create(&conn, pid, "accepted review", "bob").unwrap();
        RequestRepo::set_state(&conn, accepted.id.unwrap(), RequestState::Review).unwrap();
        let review = ReviewRepo::create(&conn, accepted.id.unwrap(), Some("managers"), None, None).unwrap();
        ReviewRepo::set_state(&conn, review.id.unwrap(), ReviewState::Accepted).unwrap();

        // Still new overall
        let fresh = RequestRepo::create(&conn, pid, "fresh", "bob").unwrap();
        ReviewRepo::create(&conn, fresh.id.unwrap(), Some("managers"), None, None).unwrap();

        // Other target
        let elsewhere = RequestRepo::create(&conn, other.id.unwrap(), "elsewhere", "bob").unwrap();
        RequestRepo::set_state(&conn, elsewhere.id.unwrap(), RequestState::Review).unwrap();
        ReviewRepo::create(&conn, elsewhere.id.unwrap(), Some("managers"), None, None).unwrap();

        let found = RequestRepo::in_review_by_group(&conn, pid, "managers").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, matching.id);

        assert!(RequestRepo::in_review_by_group(&conn, pid, "other-group").unwrap().is_empty());
    }

    #[test]
    fn test_in_state_for_target() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let project = ProjectRepo::create(&conn, "home:alice").unwrap();
        let pid = project.id.unwrap();

        let first = RequestRepo::create(&conn, pid, "one", "bob").unwrap();
        let second = RequestRepo::create(&conn, pid, "two", "bob").unwrap();
        RequestRepo::set_state(&conn, second.id.unwrap(), RequestState::Declined).unwrap();

        let new_requests = RequestRepo::in_state_for_target(&conn, pid, RequestState::New).unwrap();
        assert_eq!(new_requests.len(), 1);
        assert_eq!(new_requests[0].id, first.id);
    }

    #[test]
    fn test_review_requires_assignee() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let project = ProjectRepo::create(&conn, "home:alice").unwrap();
        let request = RequestRepo::create(&conn, project.id.unwrap(), "one", "bob").unwrap();

        assert!(ReviewRepo::create(&conn, request.id.unwrap(), None, None, None).is_err());
        assert!(ReviewRepo::list_for_request(&conn, request.id.unwrap()).unwrap().is_empty());
    }

    #[test]
    fn test_set_state_missing_request() {
        let conn = DbConnection::connect_in_memory().unwrap();
        assert!(RequestRepo::set_state(&conn, 42, RequestState::Review).is_err());
        assert!(RequestRepo::set_staging_project(&conn, 42, None).is_err());
    }
}
