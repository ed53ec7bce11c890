use rusqlite::Connection;
use std::collections::HashSet;
use crate::models::{BsRequest, RequestState, StagingWorkflow};
use crate::repo::{GroupRepo, ProjectRepo, RequestRepo};
use crate::staging::StagingError;

/// Read-only request selection for a staging workflow
///
/// Nothing here mutates requests or reviews. Results are ordered by request id,
/// but callers should treat them as sets.
pub struct RequestSelector;

impl RequestSelector {
    /// Requests in review that wait on the managers group and are not staged yet
    ///
    /// A managers group that cannot be resolved to a title matches nothing.
    pub fn stageable(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        let title = GroupRepo::get_by_id(conn, workflow.managers_group_id)?
            .map(|group| group.title)
            .filter(|title| !title.is_empty());

        match title {
            Some(title) => Ok(RequestRepo::in_review_by_group(conn, workflow.project_id, &title)?),
            None => {
                log::debug!(
                    "Managers group {} of staging workflow has no title; nothing is stageable",
                    workflow.managers_group_id
                );
                Ok(Vec::new())
            }
        }
    }

    /// Requests targeting the project that are still `new`
    pub fn ready_to_stage(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        Ok(RequestRepo::in_state_for_target(conn, workflow.project_id, RequestState::New)?)
    }

    /// Requests explicitly excluded from the workflow
    pub fn excluded(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        match workflow.id {
            Some(id) => Ok(RequestRepo::excluded_from_workflow(conn, id)?),
            None => Ok(Vec::new()),
        }
    }

    /// Requests staged in any staging project of the workflow
    pub fn staged(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        let Some(id) = workflow.id else {
            return Ok(Vec::new());
        };
        let project_ids: Vec<i64> = ProjectRepo::staging_projects_for_workflow(conn, id)?
            .into_iter()
            .map(|project| project.project_id)
            .collect();
        Ok(RequestRepo::staged_in(conn, &project_ids)?)
    }

    /// Set difference by request id
    pub fn without(requests: Vec<BsRequest>, excluded: &[BsRequest]) -> Vec<BsRequest> {
        let excluded_ids: HashSet<i64> = excluded.iter().filter_map(|request| request.id).collect();
        requests
            .into_iter()
            .filter(|request| request.id.map_or(true, |id| !excluded_ids.contains(&id)))
            .collect()
    }
}
