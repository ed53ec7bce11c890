// Tests for the workflow, requests, projects and groups commands

use predicates::prelude::*;
use tempfile::TempDir;
use test_env::{new_cmd, run_ok, setup_test_env};

/// Project home:alice with a workflow managed by staging-managers
fn setup_workflow(temp_dir: &TempDir) {
    run_ok(temp_dir, &["projects", "add", "home:alice"]);
    run_ok(temp_dir, &["groups", "add", "staging-managers"]);
    run_ok(temp_dir, &["workflow", "create", "home:alice", "--managers", "staging-managers"]);
}

/// New request on home:alice created by bob
fn add_request(temp_dir: &TempDir, description: &str) {
    run_ok(temp_dir, &["requests", "add", "--creator", "bob", "home:alice", description]);
}

fn show_json(temp_dir: &TempDir) -> serde_json::Value {
    let output = new_cmd(temp_dir)
        .args(["workflow", "show", "home:alice", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_workflow_create_materializes_staging_projects() {
    let (temp_dir, _guard) = setup_test_env("");
    run_ok(&temp_dir, &["projects", "add", "home:alice"]);
    run_ok(&temp_dir, &["groups", "add", "staging-managers"]);

    new_cmd(&temp_dir)
        .args(["workflow", "create", "home:alice", "--managers", "staging-managers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created staging workflow for 'home:alice'"))
        .stdout(predicate::str::contains("home:alice:Staging:A"))
        .stdout(predicate::str::contains("home:alice:Staging:B"));

    new_cmd(&temp_dir)
        .args(["projects", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home:alice:Staging:A"))
        .stdout(predicate::str::contains("staging"));
}

#[test]
fn test_workflow_create_without_managers_fails() {
    let (temp_dir, _guard) = setup_test_env("");
    run_ok(&temp_dir, &["projects", "add", "home:alice"]);

    new_cmd(&temp_dir)
        .args(["workflow", "create", "home:alice"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("managers group is required"));

    new_cmd(&temp_dir)
        .args(["projects", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staging").not());
}

#[test]
fn test_workflow_create_with_unknown_group_fails() {
    let (temp_dir, _guard) = setup_test_env("");
    run_ok(&temp_dir, &["projects", "add", "home:alice"]);

    new_cmd(&temp_dir)
        .args(["workflow", "create", "home:alice", "--managers", "nope"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Group 'nope' not found"));
}

#[test]
fn test_workflow_create_twice_fails() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "create", "home:alice", "--managers", "staging-managers"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("already has a staging workflow"));
}

#[test]
fn test_unassigned_requests_and_exclusion() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    add_request(&temp_dir, "Update gcc");
    run_ok(&temp_dir, &["requests", "review", "1", "--group", "staging-managers"]);

    new_cmd(&temp_dir)
        .args(["workflow", "unassigned", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update gcc"))
        .stdout(predicate::str::contains("review"));

    new_cmd(&temp_dir)
        .args(["workflow", "exclude", "home:alice", "1", "--description", "needs rebase"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Excluded request 1"));

    new_cmd(&temp_dir)
        .args(["workflow", "unassigned", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No requests found."));

    new_cmd(&temp_dir)
        .args(["workflow", "excluded", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update gcc"));

    let document = show_json(&temp_dir);
    assert_eq!(document["excluded_requests"][0]["id"], 1);
    assert_eq!(document["excluded_requests"][0]["description"], "needs rebase");

    run_ok(&temp_dir, &["workflow", "include", "home:alice", "1"]);
    new_cmd(&temp_dir)
        .args(["workflow", "unassigned", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update gcc"));
}

#[test]
fn test_ready_requests() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    add_request(&temp_dir, "Fresh request");

    new_cmd(&temp_dir)
        .args(["workflow", "ready", "home:alice", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fresh request"));

    run_ok(&temp_dir, &["requests", "review", "1", "--group", "staging-managers"]);
    new_cmd(&temp_dir)
        .args(["workflow", "ready", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No requests found."));
}

#[test]
fn test_stage_and_unstage_request() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    add_request(&temp_dir, "Update gcc");
    run_ok(&temp_dir, &["requests", "review", "1", "--group", "staging-managers"]);

    new_cmd(&temp_dir)
        .args(["requests", "stage", "1", "home:alice:Staging:A"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Staged request 1 in 'home:alice:Staging:A'"));

    let document = show_json(&temp_dir);
    assert_eq!(document["staging_projects"][0]["name"], "home:alice:Staging:A");
    assert_eq!(document["staging_projects"][0]["staged_requests"][0], 1);

    new_cmd(&temp_dir)
        .args(["workflow", "empty", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home:alice:Staging:B"))
        .stdout(predicate::str::contains("home:alice:Staging:A").not());

    new_cmd(&temp_dir)
        .args(["requests", "list", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home:alice:Staging:A"));

    run_ok(&temp_dir, &["requests", "unstage", "1"]);
    new_cmd(&temp_dir)
        .args(["workflow", "unassigned", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update gcc"));
}

#[test]
fn test_stage_excluded_request_fails() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    add_request(&temp_dir, "Update gcc");
    run_ok(&temp_dir, &["workflow", "exclude", "home:alice", "1"]);

    new_cmd(&temp_dir)
        .args(["requests", "stage", "1", "home:alice:Staging:A"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("excluded from staging"));
}

#[test]
fn test_workflow_update_moves_managers_group() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    run_ok(&temp_dir, &["groups", "add", "new-managers"]);

    new_cmd(&temp_dir)
        .args(["workflow", "update", "home:alice", "--managers", "new-managers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("managed by 'new-managers'"));

    let document = show_json(&temp_dir);
    assert_eq!(document["managers"], "new-managers");

    new_cmd(&temp_dir)
        .args(["workflow", "update", "home:alice"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("managers group is required"));
}

#[test]
fn test_workflow_destroy_keeps_staging_projects() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);

    new_cmd(&temp_dir)
        .args(["workflow", "destroy", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 staging project(s) detached"));

    new_cmd(&temp_dir)
        .args(["workflow", "show", "home:alice"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Staging workflow 'home:alice' not found"));

    new_cmd(&temp_dir)
        .args(["projects", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home:alice:Staging:A"))
        .stdout(predicate::str::contains("home:alice:Staging:B"));
}

#[test]
fn test_workflow_reviewers() {
    let (temp_dir, _guard) = setup_test_env("");
    setup_workflow(&temp_dir);
    run_ok(&temp_dir, &["users", "add", "carol"]);
    add_request(&temp_dir, "Update gcc");
    run_ok(&temp_dir, &["requests", "review", "1", "--user", "carol", "--author", "carol"]);
    run_ok(&temp_dir, &["requests", "stage", "1", "home:alice:Staging:B"]);

    new_cmd(&temp_dir)
        .args(["workflow", "reviewers", "home:alice"])
        .assert()
        .success()
        .stdout(predicate::str::contains("carol"));
}

#[test]
fn test_groups_list() {
    let (temp_dir, _guard) = setup_test_env("");
    run_ok(&temp_dir, &["groups", "add", "staging-managers"]);
    run_ok(&temp_dir, &["groups", "add", "factory-reviewers"]);

    new_cmd(&temp_dir)
        .args(["groups", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("factory-reviewers"))
        .stdout(predicate::str::contains("staging-managers"));
}

#[test]
fn test_invalid_input_is_user_error() {
    let (temp_dir, _guard) = setup_test_env("");
    run_ok(&temp_dir, &["projects", "add", "home:alice"]);
    add_request(&temp_dir, "Update gcc");

    new_cmd(&temp_dir)
        .args(["requests", "state", "1", "merged"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid request state: 'merged'"));

    new_cmd(&temp_dir)
        .args(["requests", "state", "abc", "accepted"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid request ID"));

    new_cmd(&temp_dir)
        .args(["projects", "add", "home alice"])
        .assert()
        .failure()
        .code(1);

    new_cmd(&temp_dir)
        .args(["workflow", "show", "home:bob"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Project 'home:bob' not found"));
}
