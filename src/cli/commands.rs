use clap::{Parser, Subcommand};
use rusqlite::Connection;
use crate::backend::HttpBackend;
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{Group, Project, RequestState, StagingWorkflow, User};
use crate::repo::{GroupRepo, ProjectRepo, RequestRepo, ReviewRepo, UserRepo};
use crate::staging::{DirectoryCache, StagingError, WorkflowService};
use crate::cli::output::{
    format_group_table, format_project_table, format_request_table, format_staging_projects,
    format_user_table, format_workflow_summary, to_json,
};
use crate::cli::error::{user_error, validate_principal_name, validate_project_name, validate_request_id};
use anyhow::{Context, Result};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stager")]
#[command(about = "Stager - staging workflows for build and package projects")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Project management commands
    Projects {
        #[command(subcommand)]
        subcommand: ProjectCommands,
    },
    /// Group management commands
    Groups {
        #[command(subcommand)]
        subcommand: GroupCommands,
    },
    /// User management commands
    Users {
        #[command(subcommand)]
        subcommand: UserCommands,
    },
    /// Build request commands
    Requests {
        #[command(subcommand)]
        subcommand: RequestCommands,
    },
    /// Staging workflow commands
    Workflow {
        #[command(subcommand)]
        subcommand: WorkflowCommands,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a new project
    Add {
        /// Project name (e.g., "home:alice")
        name: String,
    },
    /// List projects
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a new group
    Add {
        /// Group title
        title: String,
    },
    /// List groups
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a new user
    Add {
        /// User login
        login: String,
    },
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// Create a request targeting a project
    Add {
        /// Target project
        project: String,
        /// Request description
        #[arg(trailing_var_arg = true, required = true)]
        description: Vec<String>,
        /// Login of the request creator (defaults to the configured user)
        #[arg(long)]
        creator: Option<String>,
    },
    /// Add a review to a request; a new request moves to review
    Review {
        /// Request ID
        request_id: String,
        /// Group the review is assigned to
        #[arg(long, conflicts_with = "user")]
        group: Option<String>,
        /// User the review is assigned to
        #[arg(long)]
        user: Option<String>,
        /// Login of the review author
        #[arg(long)]
        author: Option<String>,
    },
    /// Set the state of a request
    State {
        /// Request ID
        request_id: String,
        /// New state (new, review, accepted, declined, superseded, revoked)
        state: String,
    },
    /// Stage a request into a staging project of its target's workflow
    Stage {
        /// Request ID
        request_id: String,
        /// Staging project name (e.g., "home:alice:Staging:A")
        staging_project: String,
    },
    /// Take a request out of its staging project
    Unstage {
        /// Request ID
        request_id: String,
    },
    /// List requests targeting a project
    List {
        /// Target project
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum WorkflowCommands {
    /// Create the staging workflow of a project
    Create {
        /// Project name
        project: String,
        /// Managers group title
        #[arg(long)]
        managers: Option<String>,
    },
    /// Change the managers group of a staging workflow
    Update {
        /// Project name
        project: String,
        /// New managers group title
        #[arg(long)]
        managers: Option<String>,
    },
    /// Delete a staging workflow; staging projects are kept
    Destroy {
        /// Project name
        project: String,
    },
    /// Show a staging workflow
    Show {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Requests waiting on the managers group that are not staged or excluded
    Unassigned {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// New requests that are not excluded
    Ready {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Requests excluded from staging
    Excluded {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Exclude a request from staging
    Exclude {
        /// Project name
        project: String,
        /// Request ID
        request_id: String,
        /// Reason for the exclusion
        #[arg(long)]
        description: Option<String>,
    },
    /// Drop the exclusion of a request
    Include {
        /// Project name
        project: String,
        /// Request ID
        request_id: String,
    },
    /// Staging projects with no staged requests
    Empty {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Users who reviewed staged requests
    Reviewers {
        /// Project name
        project: String,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Write the staging workflow to the backend (needs global_write_through)
    Sync {
        /// Project name
        project: String,
        /// Timeout in seconds for this write
        #[arg(long)]
        timeout: Option<u64>,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::try_parse().unwrap_or_else(|e| e.exit());
    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Projects { subcommand } => handle_projects(subcommand),
        Commands::Groups { subcommand } => handle_groups(subcommand),
        Commands::Users { subcommand } => handle_users(subcommand),
        Commands::Requests { subcommand } => handle_requests(subcommand),
        Commands::Workflow { subcommand } => handle_workflow(subcommand),
    }
}

fn connect() -> Result<Connection> {
    DbConnection::connect().context("Failed to connect to database")
}

fn print_json_or<T: serde::Serialize + ?Sized>(json: bool, value: &T, table: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", to_json(value)?);
    } else {
        println!("{}", table());
    }
    Ok(())
}

fn require_project(conn: &Connection, name: &str) -> Result<Project> {
    if let Err(e) = validate_project_name(name) {
        user_error(&e);
    }
    Ok(ProjectRepo::get_by_name(conn, name)?.ok_or_else(|| StagingError::not_found("Project", name))?)
}

/// Managers group by title; `None` is passed through so validation reports it
fn managers_group(conn: &Connection, title: Option<&str>) -> Result<Option<Group>> {
    match title {
        Some(title) => {
            let group = GroupRepo::get_by_title(conn, title)?
                .ok_or_else(|| StagingError::not_found("Group", title))?;
            Ok(Some(group))
        }
        None => Ok(None),
    }
}

fn parse_request_id(id: &str) -> i64 {
    validate_request_id(id).unwrap_or_else(|e| user_error(&e))
}

fn handle_projects(cmd: ProjectCommands) -> Result<()> {
    let conn = connect()?;

    match cmd {
        ProjectCommands::Add { name } => {
            if let Err(e) = validate_project_name(&name) {
                user_error(&e);
            }
            if ProjectRepo::get_by_name(&conn, &name)?.is_some() {
                user_error(&format!("Project '{}' already exists", name));
            }

            let project = ProjectRepo::create(&conn, &name)?;
            println!("Created project '{}' (id: {})", project.name, project.id.unwrap_or_default());
            Ok(())
        }
        ProjectCommands::List { json } => {
            let projects = ProjectRepo::list(&conn).context("Failed to list projects")?;
            print_json_or(json, &projects, || format_project_table(&projects))
        }
    }
}

fn handle_groups(cmd: GroupCommands) -> Result<()> {
    let conn = connect()?;

    match cmd {
        GroupCommands::Add { title } => {
            if let Err(e) = validate_principal_name(&title, "Group") {
                user_error(&e);
            }
            if GroupRepo::get_by_title(&conn, &title)?.is_some() {
                user_error(&format!("Group '{}' already exists", title));
            }

            let group = GroupRepo::create(&conn, &title)?;
            println!("Created group '{}' (id: {})", group.title, group.id.unwrap_or_default());
            Ok(())
        }
        GroupCommands::List { json } => {
            let directory = DirectoryCache::global().load_groups(&conn)?;
            let mut groups: Vec<Group> = directory.values().cloned().collect();
            groups.sort_by(|a, b| a.title.cmp(&b.title));
            print_json_or(json, &groups, || format_group_table(&groups))
        }
    }
}

fn handle_users(cmd: UserCommands) -> Result<()> {
    let conn = connect()?;

    match cmd {
        UserCommands::Add { login } => {
            if let Err(e) = validate_principal_name(&login, "Login") {
                user_error(&e);
            }
            if UserRepo::get_by_login(&conn, &login)?.is_some() {
                user_error(&format!("User '{}' already exists", login));
            }

            let user = UserRepo::create(&conn, &login)?;
            println!("Created user '{}' (id: {})", user.login, user.id.unwrap_or_default());
            Ok(())
        }
    }
}

fn handle_requests(cmd: RequestCommands) -> Result<()> {
    let conn = connect()?;

    match cmd {
        RequestCommands::Add { project, description, creator } => {
            let target = require_project(&conn, &project)?;
            let description = description.join(" ");
            if description.trim().is_empty() {
                user_error("Request description cannot be empty");
            }
            let creator = match creator {
                Some(login) => login,
                None => Config::load()?.current_login().to_string(),
            };

            let request = RequestRepo::create(&conn, target.id.unwrap_or_default(), &description, &creator)?;
            println!("Created request {} targeting '{}'", request.id.unwrap_or_default(), target.name);
            Ok(())
        }
        RequestCommands::Review { request_id, group, user, author } => {
            let id = parse_request_id(&request_id);
            let request = RequestRepo::get_by_id(&conn, id)?
                .ok_or_else(|| StagingError::not_found("Request", id))?;
            if group.is_none() && user.is_none() {
                user_error("A review needs --group or --user");
            }
            if let Some(title) = group.as_deref() {
                GroupRepo::get_by_title(&conn, title)?.ok_or_else(|| StagingError::not_found("Group", title))?;
            }
            let author_id = match author.as_deref() {
                Some(login) => {
                    let author = UserRepo::get_by_login(&conn, login)?
                        .ok_or_else(|| StagingError::not_found("User", login))?;
                    author.id
                }
                None => None,
            };

            let tx = conn.unchecked_transaction()?;
            let review = ReviewRepo::create(&tx, id, group.as_deref(), user.as_deref(), author_id)?;
            if request.state == RequestState::New {
                RequestRepo::set_state(&tx, id, RequestState::Review)?;
            }
            tx.commit()?;

            let assignee = group.or(user).unwrap_or_default();
            println!("Added review {} for '{}' to request {}", review.id.unwrap_or_default(), assignee, id);
            Ok(())
        }
        RequestCommands::State { request_id, state } => {
            let id = parse_request_id(&request_id);
            let state = RequestState::from_str(&state)
                .unwrap_or_else(|| user_error(&format!("Invalid request state: '{}'", state)));
            RequestRepo::get_by_id(&conn, id)?.ok_or_else(|| StagingError::not_found("Request", id))?;

            RequestRepo::set_state(&conn, id, state)?;
            println!("Request {} is now {}", id, state.as_str());
            Ok(())
        }
        RequestCommands::Stage { request_id, staging_project } => {
            let id = parse_request_id(&request_id);
            let workflow = workflow_of_request(&conn, id)?;
            let staged = WorkflowService::stage_request(&conn, &workflow, id, &staging_project)?;
            println!("Staged request {} in '{}'", id, staged.name);
            Ok(())
        }
        RequestCommands::Unstage { request_id } => {
            let id = parse_request_id(&request_id);
            let workflow = workflow_of_request(&conn, id)?;
            WorkflowService::unstage_request(&conn, &workflow, id)?;
            println!("Unstaged request {}", id);
            Ok(())
        }
        RequestCommands::List { project, json } => {
            let target = require_project(&conn, &project)?;
            let requests = RequestRepo::list_for_target(&conn, target.id.unwrap_or_default())?;
            print_json_or(json, &requests, || {
                format_request_table(&requests, |id| {
                    ProjectRepo::get_by_id(&conn, id).ok().flatten().map(|project| project.name)
                })
            })
        }
    }
}

/// Workflow of the project a request targets
fn workflow_of_request(conn: &Connection, request_id: i64) -> Result<StagingWorkflow> {
    let request = RequestRepo::get_by_id(conn, request_id)?
        .ok_or_else(|| StagingError::not_found("Request", request_id))?;
    let target = ProjectRepo::get_by_id(conn, request.target_project_id)?
        .ok_or_else(|| StagingError::not_found("Project", request.target_project_id))?;
    let (_, workflow) = WorkflowService::find_by_project(conn, &target.name)?;
    Ok(workflow)
}

fn handle_workflow(cmd: WorkflowCommands) -> Result<()> {
    let conn = connect()?;

    match cmd {
        WorkflowCommands::Create { project, managers } => {
            let project = require_project(&conn, &project)?;
            let group = managers_group(&conn, managers.as_deref())?;
            let workflow = WorkflowService::create(&conn, &project, group.as_ref())?;
            let staging_projects = WorkflowService::staging_projects(&conn, &workflow)?;
            println!("Created staging workflow for '{}'", project.name);
            for staging_project in staging_projects {
                println!("  {}", staging_project.name);
            }
            Ok(())
        }
        WorkflowCommands::Update { project, managers } => {
            let (project, mut workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let group = managers_group(&conn, managers.as_deref())?;
            WorkflowService::update(&conn, &mut workflow, group.as_ref())?;

            let title = group.map(|group| group.title).unwrap_or_default();
            println!("Staging workflow of '{}' is managed by '{}'", project.name, title);
            Ok(())
        }
        WorkflowCommands::Destroy { project } => {
            let (project, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let summary = WorkflowService::destroy(&conn, workflow)?;
            println!(
                "Destroyed staging workflow of '{}' ({} staging project(s) detached, {} exclusion(s) removed)",
                project.name, summary.detached_projects, summary.removed_exclusions
            );
            Ok(())
        }
        WorkflowCommands::Show { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let document = WorkflowService::render(&conn, &workflow)?;
            print_json_or(json, &document, || format_workflow_summary(&document))
        }
        WorkflowCommands::Unassigned { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let requests = WorkflowService::unassigned_requests(&conn, &workflow)?;
            print_json_or(json, &requests, || format_request_table(&requests, |_| None))
        }
        WorkflowCommands::Ready { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let requests = WorkflowService::ready_requests(&conn, &workflow)?;
            print_json_or(json, &requests, || format_request_table(&requests, |_| None))
        }
        WorkflowCommands::Excluded { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let requests = WorkflowService::excluded_requests(&conn, &workflow)?;
            print_json_or(json, &requests, || format_request_table(&requests, |_| None))
        }
        WorkflowCommands::Exclude { project, request_id, description } => {
            let id = parse_request_id(&request_id);
            let (project, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            WorkflowService::exclude_request(&conn, &workflow, id, description.as_deref())?;
            println!("Excluded request {} from staging in '{}'", id, project.name);
            Ok(())
        }
        WorkflowCommands::Include { project, request_id } => {
            let id = parse_request_id(&request_id);
            let (project, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            WorkflowService::include_request(&conn, &workflow, id)?;
            println!("Request {} can be staged in '{}' again", id, project.name);
            Ok(())
        }
        WorkflowCommands::Empty { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let projects = WorkflowService::without_staged_requests(&conn, &workflow)?;
            print_json_or(json, &projects, || format_staging_projects(&projects))
        }
        WorkflowCommands::Reviewers { project, json } => {
            let (_, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let mut users: Vec<User> = WorkflowService::reviewers(&conn, &workflow)?.into_values().collect();
            users.sort_by(|a, b| a.login.cmp(&b.login));
            print_json_or(json, &users, || format_user_table(&users))
        }
        WorkflowCommands::Sync { project, timeout } => {
            let (project, workflow) = WorkflowService::find_by_project(&conn, &project)?;
            let config = Config::load()?;
            let backend = HttpBackend::from_config(&config).map_err(StagingError::from)?;
            let timeout = timeout.map(Duration::from_secs);

            if WorkflowService::sync_to_backend(&conn, &workflow, &config, &backend, timeout)? {
                println!("Wrote staging workflow of '{}' to {}", project.name, config.backend_url);
            } else {
                println!("global_write_through is disabled; nothing written");
            }
            Ok(())
        }
    }
}
