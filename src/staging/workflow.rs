use rusqlite::Connection;
use std::time::Duration;
use crate::backend::StagingBackend;
use crate::config::Config;
use crate::models::{
    BsRequest, Group, Project, RequestExclusion, StagingProject, StagingWorkflow,
};
use crate::repo::{ExclusionRepo, GroupRepo, ProjectRepo, RequestRepo, WorkflowRepo};
use crate::staging::directory::{DirectoryCache, UserDirectory};
use crate::staging::projects::StagingProjectManager;
use crate::staging::render::{ExcludedRequestSummary, StagingProjectSummary, WorkflowDocument};
use crate::staging::selector::RequestSelector;
use crate::staging::StagingError;

/// What `destroy` removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroySummary {
    pub detached_projects: usize,
    pub removed_exclusions: usize,
}

/// Staging workflow operations
///
/// Every operation takes the connection of the calling request. Creation and
/// destruction run in one transaction each; managers group reassignment
/// commits per staging project.
///
/// # Example
///
/// ```no_run
/// use stager::db::DbConnection;
/// use stager::repo::{GroupRepo, ProjectRepo};
/// use stager::staging::WorkflowService;
///
/// let conn = DbConnection::connect().unwrap();
/// let project = ProjectRepo::find_or_create_by_name(&conn, "home:alice").unwrap();
/// let managers = GroupRepo::get_by_title(&conn, "staging-managers").unwrap();
/// let workflow = WorkflowService::create(&conn, &project, managers.as_ref()).unwrap();
/// let unassigned = WorkflowService::unassigned_requests(&conn, &workflow).unwrap();
/// ```
pub struct WorkflowService;

impl WorkflowService {
    /// Create the workflow of `project`, its staging projects and the reviewer grant
    pub fn create(
        conn: &Connection,
        project: &Project,
        managers_group: Option<&Group>,
    ) -> Result<StagingWorkflow, StagingError> {
        let managers_group = managers_group
            .ok_or_else(|| StagingError::validation("managers group is required"))?;
        let group_id = managers_group
            .id
            .ok_or_else(|| StagingError::validation("managers group must be saved"))?;
        let project_id = project
            .id
            .ok_or_else(|| StagingError::validation("project must be saved"))?;

        if project.kind.is_staging() {
            return Err(StagingError::validation(format!(
                "'{}' is a staging project and cannot have a staging workflow",
                project.name
            )));
        }
        if WorkflowRepo::get_by_project(conn, project_id)?.is_some() {
            return Err(StagingError::validation(format!(
                "project '{}' already has a staging workflow",
                project.name
            )));
        }

        let tx = conn.unchecked_transaction()?;
        let workflow = WorkflowRepo::insert(&tx, &StagingWorkflow::new(project_id, group_id))?;
        let staging_projects = StagingProjectManager::create_staging_projects(&tx, &workflow, &project.name)?;
        StagingProjectManager::grant_reviewer_role(&tx, project_id, group_id)?;
        tx.commit()?;

        log::info!(
            "Created staging workflow for '{}' managed by '{}' with {} staging project(s)",
            project.name,
            managers_group.title,
            staging_projects.len()
        );
        Ok(workflow)
    }

    /// Look up a project and its workflow by project name
    pub fn find_by_project(conn: &Connection, project_name: &str) -> Result<(Project, StagingWorkflow), StagingError> {
        let project = ProjectRepo::get_by_name(conn, project_name)?
            .ok_or_else(|| StagingError::not_found("Project", project_name))?;
        let project_id = project
            .id
            .ok_or_else(|| StagingError::not_found("Project", project_name))?;
        let workflow = WorkflowRepo::get_by_project(conn, project_id)?
            .ok_or_else(|| StagingError::not_found("Staging workflow", project_name))?;
        Ok((project, workflow))
    }

    /// Change the managers group, moving all staging projects to the new group
    ///
    /// On success `workflow.managers_group_id` holds the new group. This
    /// in-memory value is set explicitly after the store write and is
    /// authoritative for the caller; it does not depend on reloading.
    /// An unchanged group is a no-op.
    pub fn update(
        conn: &Connection,
        workflow: &mut StagingWorkflow,
        managers_group: Option<&Group>,
    ) -> Result<(), StagingError> {
        let new_group = managers_group
            .ok_or_else(|| StagingError::validation("managers group is required"))?;
        let new_group_id = new_group
            .id
            .ok_or_else(|| StagingError::validation("managers group must be saved"))?;
        let workflow_id = workflow
            .id
            .ok_or_else(|| StagingError::validation("staging workflow must be saved"))?;

        if new_group_id == workflow.managers_group_id {
            return Ok(());
        }

        let old_group_id = workflow.managers_group_id;
        let moved = StagingProjectManager::reassign_managers_group(conn, workflow_id, old_group_id, new_group_id)?;
        workflow.modified_ts = WorkflowRepo::update_managers_group(conn, workflow_id, new_group_id)?;
        workflow.managers_group_id = new_group_id;

        log::info!(
            "Staging workflow {} now managed by '{}' ({} staging project(s) moved)",
            workflow_id,
            new_group.title,
            moved.len()
        );
        Ok(())
    }

    /// Delete the workflow; staging projects are detached, exclusions deleted
    pub fn destroy(conn: &Connection, workflow: StagingWorkflow) -> Result<DestroySummary, StagingError> {
        let workflow_id = workflow
            .id
            .ok_or_else(|| StagingError::validation("staging workflow must be saved"))?;

        let tx = conn.unchecked_transaction()?;
        let detached_projects = ProjectRepo::detach_workflow(&tx, workflow_id)?;
        let removed_exclusions = ExclusionRepo::delete_for_workflow(&tx, workflow_id)?;
        WorkflowRepo::delete(&tx, workflow_id)?;
        tx.commit()?;

        log::info!(
            "Destroyed staging workflow {} ({} staging project(s) detached, {} exclusion(s) removed)",
            workflow_id,
            detached_projects,
            removed_exclusions
        );
        Ok(DestroySummary {
            detached_projects,
            removed_exclusions,
        })
    }

    /// Stageable requests that are not excluded
    pub fn unassigned_requests(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        let stageable = RequestSelector::stageable(conn, workflow)?;
        let excluded = RequestSelector::excluded(conn, workflow)?;
        Ok(RequestSelector::without(stageable, &excluded))
    }

    /// New requests that are not excluded
    pub fn ready_requests(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        let ready = RequestSelector::ready_to_stage(conn, workflow)?;
        let excluded = RequestSelector::excluded(conn, workflow)?;
        Ok(RequestSelector::without(ready, &excluded))
    }

    pub fn excluded_requests(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        RequestSelector::excluded(conn, workflow)
    }

    pub fn staged_requests(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<BsRequest>, StagingError> {
        RequestSelector::staged(conn, workflow)
    }

    pub fn staging_projects(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<StagingProject>, StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        Ok(ProjectRepo::staging_projects_for_workflow(conn, workflow_id)?)
    }

    /// Staging projects with no request staged in them
    pub fn without_staged_requests(conn: &Connection, workflow: &StagingWorkflow) -> Result<Vec<StagingProject>, StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        Ok(ProjectRepo::staging_projects_without_requests(conn, workflow_id)?)
    }

    /// Exclude a request targeting the workflow's project from staging
    pub fn exclude_request(
        conn: &Connection,
        workflow: &StagingWorkflow,
        request_id: i64,
        description: Option<&str>,
    ) -> Result<RequestExclusion, StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        let request = Self::request_of(conn, workflow, request_id)?;

        if let Some(staging_project_id) = request.staging_project_id {
            return Err(StagingError::validation(format!(
                "request {} is staged in project {}; unstage it first",
                request_id, staging_project_id
            )));
        }
        if ExclusionRepo::get(conn, workflow_id, request_id)?.is_some() {
            return Err(StagingError::validation(format!(
                "request {} is already excluded",
                request_id
            )));
        }

        let exclusion = ExclusionRepo::create(conn, workflow_id, request_id, description)?;
        log::info!("Excluded request {} from staging workflow {}", request_id, workflow_id);
        Ok(exclusion)
    }

    /// Drop the exclusion of a request
    pub fn include_request(conn: &Connection, workflow: &StagingWorkflow, request_id: i64) -> Result<(), StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        if !ExclusionRepo::delete(conn, workflow_id, request_id)? {
            return Err(StagingError::not_found("Exclusion of request", request_id));
        }
        log::info!("Request {} no longer excluded from staging workflow {}", request_id, workflow_id);
        Ok(())
    }

    /// Stage a request into one of the workflow's staging projects
    pub fn stage_request(
        conn: &Connection,
        workflow: &StagingWorkflow,
        request_id: i64,
        staging_project_name: &str,
    ) -> Result<StagingProject, StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        let request = Self::request_of(conn, workflow, request_id)?;

        let staging_project = ProjectRepo::get_staging_by_name(conn, staging_project_name)?
            .ok_or_else(|| StagingError::not_found("Staging project", staging_project_name))?;
        if staging_project.staging_workflow_id != Some(workflow_id) {
            return Err(StagingError::validation(format!(
                "'{}' does not belong to this staging workflow",
                staging_project_name
            )));
        }
        if request.state.is_final() {
            return Err(StagingError::validation(format!(
                "request {} is {} and cannot be staged",
                request_id,
                request.state.as_str()
            )));
        }
        if ExclusionRepo::get(conn, workflow_id, request_id)?.is_some() {
            return Err(StagingError::validation(format!(
                "request {} is excluded from staging",
                request_id
            )));
        }

        RequestRepo::set_staging_project(conn, request_id, Some(staging_project.project_id))?;
        log::info!("Staged request {} in '{}'", request_id, staging_project.name);
        Ok(staging_project)
    }

    /// Take a request out of its staging project
    pub fn unstage_request(conn: &Connection, workflow: &StagingWorkflow, request_id: i64) -> Result<(), StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        let request = Self::request_of(conn, workflow, request_id)?;

        let owned = ProjectRepo::staging_projects_for_workflow(conn, workflow_id)?;
        match request.staging_project_id {
            Some(id) if owned.iter().any(|project| project.project_id == id) => {
                RequestRepo::set_staging_project(conn, request_id, None)?;
                log::info!("Unstaged request {}", request_id);
                Ok(())
            }
            _ => Err(StagingError::validation(format!(
                "request {} is not staged in this staging workflow",
                request_id
            ))),
        }
    }

    /// Users who reviewed requests staged in this workflow, keyed by login
    pub fn reviewers(conn: &Connection, workflow: &StagingWorkflow) -> Result<UserDirectory, StagingError> {
        let staging_projects = Self::staging_projects(conn, workflow)?;
        DirectoryCache::load_users(conn, &staging_projects)
    }

    /// Canonical representation of the workflow
    pub fn render(conn: &Connection, workflow: &StagingWorkflow) -> Result<WorkflowDocument, StagingError> {
        let workflow_id = Self::saved_id(workflow)?;
        let project = ProjectRepo::get_by_id(conn, workflow.project_id)?
            .ok_or_else(|| StagingError::not_found("Project", workflow.project_id))?;
        let managers = GroupRepo::get_by_id(conn, workflow.managers_group_id)?
            .ok_or_else(|| StagingError::not_found("Group", workflow.managers_group_id))?;

        let mut staging_projects = Vec::new();
        for staging_project in ProjectRepo::staging_projects_for_workflow(conn, workflow_id)? {
            let staged_requests = RequestRepo::staged_in(conn, &[staging_project.project_id])?
                .into_iter()
                .filter_map(|request| request.id)
                .collect();
            staging_projects.push(StagingProjectSummary {
                name: staging_project.name,
                staged_requests,
            });
        }

        let excluded_requests = ExclusionRepo::list_for_workflow(conn, workflow_id)?
            .into_iter()
            .map(|exclusion| ExcludedRequestSummary {
                id: exclusion.bs_request_id,
                description: exclusion.description,
            })
            .collect();

        Ok(WorkflowDocument {
            project: project.name,
            managers: managers.title,
            staging_projects,
            excluded_requests,
        })
    }

    /// Mirror the workflow to the backend when write-through is enabled
    ///
    /// Returns whether a backend write happened. Backend errors are returned
    /// as-is and never retried here.
    pub fn sync_to_backend(
        conn: &Connection,
        workflow: &StagingWorkflow,
        config: &Config,
        backend: &dyn StagingBackend,
        timeout: Option<Duration>,
    ) -> Result<bool, StagingError> {
        if !config.global_write_through {
            log::debug!("global_write_through is off; not writing staging workflow to backend");
            return Ok(false);
        }

        let document = Self::render(conn, workflow)?;
        backend.write_staging_workflow(&document.project, config.current_login(), &document.to_json()?, timeout)?;
        Ok(true)
    }

    fn saved_id(workflow: &StagingWorkflow) -> Result<i64, StagingError> {
        workflow
            .id
            .ok_or_else(|| StagingError::validation("staging workflow must be saved"))
    }

    /// Load a request and check it targets the workflow's project
    fn request_of(conn: &Connection, workflow: &StagingWorkflow, request_id: i64) -> Result<BsRequest, StagingError> {
        let request = RequestRepo::get_by_id(conn, request_id)?
            .ok_or_else(|| StagingError::not_found("Request", request_id))?;
        if request.target_project_id != workflow.project_id {
            return Err(StagingError::validation(format!(
                "request {} does not target the project of this staging workflow",
                request_id
            )));
        }
        Ok(request)
    }
}
