use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn evolve_ephemeral_runs_successfully_with_no_episodes() {
    Command::cargo_bin("orchestrator-cli")
        .unwrap()
        .args(["--ephemeral", "evolve"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overall_success=true"));
}

#[test]
fn tick_ephemeral_with_a_snapshot_file_creates_a_sprint() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("snapshot.json");
    std::fs::write(
        &snapshot_path,
        r#"{
            "project_id": "P1",
            "backlog_task_count": 10,
            "unassigned_tasks": 6,
            "active_sprint_count": 0,
            "team_size": 4,
            "team_availability": {"status": "ok", "conflicts": []},
            "active_sprint_id": null,
            "sprint_task_summary": null
        }"#,
    )
    .unwrap();

    Command::cargo_bin("orchestrator-cli")
        .unwrap()
        .args(["--ephemeral", "tick", "--project-id", "P1", "--snapshot"])
        .arg(&snapshot_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"sprint_created\": true"));
}

#[test]
fn tick_without_a_snapshot_or_reachable_project_service_fails() {
    Command::cargo_bin("orchestrator-cli")
        .unwrap()
        .args(["--ephemeral", "tick", "--project-id", "unknown-project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
