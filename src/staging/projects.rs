use rusqlite::Connection;
use crate::models::{staging_project_name, StagingProject, StagingWorkflow, ROLE_MAINTAINER, ROLE_REVIEWER};
use crate::repo::{ProjectRepo, RelationshipRepo, RoleRepo, WorkflowRepo};
use crate::staging::StagingError;

/// Letters of the staging projects materialized for a new workflow
pub const STAGING_LETTERS: [char; 2] = ['A', 'B'];

/// Creates staging projects and keeps their managers group in line with the workflow
///
/// The managers group of a staging project is a `maintainer` relationship
/// between the staging project and the group.
pub struct StagingProjectManager;

impl StagingProjectManager {
    /// Materialize `<parent>:Staging:A` and `<parent>:Staging:B` for a saved workflow
    ///
    /// Existing projects with those names are reused and retyped. A staging
    /// project already owned by another workflow, or one that owns a workflow
    /// itself, is left alone and not returned; no error is raised for it.
    pub fn create_staging_projects(
        conn: &Connection,
        workflow: &StagingWorkflow,
        parent_name: &str,
    ) -> Result<Vec<StagingProject>, StagingError> {
        let workflow_id = workflow
            .id
            .ok_or_else(|| StagingError::validation("staging workflow must be saved before creating staging projects"))?;

        let mut assigned = Vec::new();
        for letter in STAGING_LETTERS {
            let name = staging_project_name(parent_name, letter);
            let project = ProjectRepo::find_or_create_by_name(conn, &name)?;
            if let Some(project_id) = project.id {
                if WorkflowRepo::get_by_project(conn, project_id)?.is_some() {
                    log::warn!(
                        "Project '{}' owns a staging workflow and cannot become a staging project; skipping",
                        name
                    );
                    continue;
                }
            }
            let mut staging = ProjectRepo::retype_as_staging(conn, &project)?;

            if staging.owned_by_other(workflow_id) {
                // TODO: ask product whether a foreign-owned staging project should fail creation
                log::warn!(
                    "Staging project '{}' already belongs to staging workflow {:?}; skipping",
                    name,
                    staging.staging_workflow_id
                );
                continue;
            }

            ProjectRepo::set_staging_workflow(conn, staging.project_id, Some(workflow_id))?;
            staging.staging_workflow_id = Some(workflow_id);
            Self::replace_managers_groups(conn, staging.project_id, workflow.managers_group_id)?;
            log::debug!("Assigned staging project '{}' to staging workflow {}", name, workflow_id);
            assigned.push(staging);
        }

        Ok(assigned)
    }

    /// Move every staging project of a workflow from `old_group_id` to `new_group_id`
    ///
    /// Each staging project is updated in its own transaction. On failure the
    /// loop stops and the error names the failing project and the ones
    /// already moved. Running the reassignment again converges.
    pub fn reassign_managers_group(
        conn: &Connection,
        workflow_id: i64,
        old_group_id: i64,
        new_group_id: i64,
    ) -> Result<Vec<String>, StagingError> {
        let projects = ProjectRepo::staging_projects_for_workflow(conn, workflow_id)?;
        let mut completed = Vec::new();

        for project in projects {
            let result = Self::reassign_one(conn, &project, old_group_id, new_group_id);
            if let Err(err) = result {
                log::warn!(
                    "Reassigning managers group stopped at '{}' after {} project(s): {}",
                    project.name,
                    completed.len(),
                    err
                );
                return Err(StagingError::PartialReassignment {
                    project: project.name,
                    completed,
                    source: Box::new(err),
                });
            }
            completed.push(project.name);
        }

        Ok(completed)
    }

    fn reassign_one(
        conn: &Connection,
        project: &StagingProject,
        old_group_id: i64,
        new_group_id: i64,
    ) -> Result<(), StagingError> {
        let tx = conn.unchecked_transaction()?;
        Self::unassign_managers_group(&tx, project.project_id, old_group_id)?;
        Self::assign_managers_group(&tx, project.project_id, new_group_id)?;
        ProjectRepo::touch(&tx, project.project_id)?;
        tx.commit()?;
        Ok(())
    }

    /// Ensure the group holds the `reviewer` role on the project, then store the project
    pub fn grant_reviewer_role(conn: &Connection, project_id: i64, group_id: i64) -> Result<(), StagingError> {
        let role = RoleRepo::find_by_title(conn, ROLE_REVIEWER)?
            .ok_or_else(|| StagingError::not_found("Role", ROLE_REVIEWER))?;
        RelationshipRepo::find_or_create(conn, project_id, group_id, role.id)?;
        ProjectRepo::touch(conn, project_id)?;
        Ok(())
    }

    pub fn assign_managers_group(conn: &Connection, project_id: i64, group_id: i64) -> Result<(), StagingError> {
        let role = Self::maintainer_role(conn)?;
        RelationshipRepo::find_or_create(conn, project_id, group_id, role)?;
        Ok(())
    }

    /// Make `group_id` the only managers group of a staging project
    pub fn replace_managers_groups(conn: &Connection, project_id: i64, group_id: i64) -> Result<(), StagingError> {
        let role = Self::maintainer_role(conn)?;
        for stale in RelationshipRepo::group_ids_with_role(conn, project_id, role)? {
            if stale != group_id {
                RelationshipRepo::remove(conn, project_id, stale, role)?;
                log::debug!("Removed stale managers group {} from project {}", stale, project_id);
            }
        }
        RelationshipRepo::find_or_create(conn, project_id, group_id, role)?;
        Ok(())
    }

    pub fn unassign_managers_group(conn: &Connection, project_id: i64, group_id: i64) -> Result<(), StagingError> {
        let role = Self::maintainer_role(conn)?;
        RelationshipRepo::remove(conn, project_id, group_id, role)?;
        Ok(())
    }

    /// Groups currently managing a staging project
    pub fn managers_group_ids(conn: &Connection, project_id: i64) -> Result<Vec<i64>, StagingError> {
        let role = Self::maintainer_role(conn)?;
        Ok(RelationshipRepo::group_ids_with_role(conn, project_id, role)?)
    }

    fn maintainer_role(conn: &Connection) -> Result<i64, StagingError> {
        RoleRepo::find_by_title(conn, ROLE_MAINTAINER)?
            .map(|role| role.id)
            .ok_or_else(|| StagingError::not_found("Role", ROLE_MAINTAINER))
    }
}
