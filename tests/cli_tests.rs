// CLI integration tests for the workflow-forge binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn forge() -> Command {
    let mut cmd = Command::cargo_bin("workflow-forge").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    forge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("table"))
        .stdout(predicate::str::contains("steps"))
        .stdout(predicate::str::contains("replay"));
}

#[test]
fn test_table_prints_every_state() {
    let output = forge().args(["table", "--compact"]).output().unwrap();
    assert!(output.status.success());

    let rows: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows.len(), 13);

    let ready = rows.iter().find(|r| r["from"] == "ready").unwrap();
    assert_eq!(ready["terminal"], true);
    let error_handling = rows.iter().find(|r| r["from"] == "error_handling").unwrap();
    assert_eq!(error_handling["terminal"], false);
    assert_eq!(
        error_handling["to"],
        serde_json::json!(["clarification_active", "idle"])
    );
}

#[test]
fn test_steps_maps_checkpoint_states_to_review() {
    forge()
        .arg("steps")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"waiting_confirmation\""))
        .stdout(predicate::str::contains("\"review\""));
}

#[test]
fn test_replay_reaches_ready() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("happy.json");
    fs::write(
        &script,
        r#"[
            {"op": "set_user_prompt", "text": "build a slack bot"},
            {"op": "set_clarifying_questions", "questions": []},
            {"op": "confirm_understanding", "text": "post to slack daily"},
            {"op": "set_required_credentials", "names": ["SLACK_TOKEN"]},
            {"op": "set_provided_credentials", "credentials": {"slack_token": "xoxb-secret"}},
            {"op": "start_building"},
            {"op": "set_workflow_blueprint", "blueprint": {"nodes": [{"id": "1"}], "edges": []}},
            {"op": "mark_workflow_ready"}
        ]"#,
    )
    .unwrap();

    let output = forge()
        .args(["replay", "--compact"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("xoxb-secret"));

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["failures"], 0);
    assert_eq!(report["status"]["current_state"], "ready");
    assert_eq!(report["status"]["wizard_step"], "complete");
}

#[test]
fn test_replay_strict_flag_blocks_uplift() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("uplift.json");
    fs::write(
        &script,
        r#"[
            {"op": "set_user_prompt", "text": "archive old tickets"},
            {"op": "move_to_validation", "blueprint": {"nodes": [{"id": "1"}]}, "skip_confirmation": true}
        ]"#,
    )
    .unwrap();

    let output = forge()
        .args(["replay", "--compact", "--strict"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["failures"], 1);
    assert_eq!(report["steps"][1]["error_kind"], "precondition_failure");
    assert_eq!(report["status"]["current_state"], "prompt_received");
}

#[test]
fn test_replay_with_config_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("forge.toml");
    fs::write(&config, "[pipeline]\nmax_build_retries = 1\n").unwrap();
    let script = dir.path().join("retry.json");
    fs::write(
        &script,
        r#"[
            {"op": "set_user_prompt", "text": "resize images"},
            {"op": "confirm_understanding", "text": "resize uploads to 512px"},
            {"op": "start_building"},
            {"op": "retry_building"},
            {"op": "retry_building"}
        ]"#,
    )
    .unwrap();

    let output = forge()
        .arg("--config")
        .arg(&config)
        .args(["replay", "--compact"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["steps"][3]["detail"], "retry 1");
    assert_eq!(report["steps"][4]["error_kind"], "retry_exhausted");
}

#[test]
fn test_replay_rejects_malformed_script() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("broken.json");
    fs::write(&script, r#"[{"op": "summon_workflow"}]"#).unwrap();

    forge()
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid script"));
}
