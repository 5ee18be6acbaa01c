use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ORDER_WORKFLOW: &str = r#"{
  "trigger": "t0",
  "tasks": {
    "t0": {
      "type": "condition",
      "properties": {
        "condition_type": "if",
        "conditions": [{"field": "order.total", "operator": ">", "value": 100}]
      },
      "next": ["t1"]
    },
    "t1": {
      "type": "condition",
      "properties": {
        "condition_type": "switch",
        "conditions": [{"field": "order.currency", "value": "EUR"}]
      }
    }
  }
}"#;

fn hephestos(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hephestos").expect("binary");
    cmd.current_dir(workspace)
        .env_remove("RUST_LOG")
        .env_remove("HEPHESTOS_WORKER")
        .env_remove("HEPHESTOS_STATE_DIR")
        .env_remove("HEPHESTOS_LOG_DIR");
    cmd
}

fn write(dir: &Path, name: &str, content: &str) {
    if let Some(parent) = dir.join(name).parent() {
        fs::create_dir_all(parent).expect("create dir");
    }
    fs::write(dir.join(name), content).expect("write file");
}

#[test]
fn help_lists_workflow_commands() {
    let temp = TempDir::new().expect("temp dir");
    hephestos(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("WORKFLOW COMMANDS"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("process"));
}

#[test]
fn run_prints_completed_result() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "order.json", ORDER_WORKFLOW);
    write(
        temp.path(),
        "context.json",
        r#"{"order": {"total": 250, "currency": "EUR"}}"#,
    );

    let output = hephestos(temp.path())
        .args(["run", "--workflow", "order.json", "--context", "context.json"])
        .arg("--workspace")
        .arg(temp.path())
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(0));

    let result: Value = serde_json::from_slice(&output.stdout).expect("json result");
    assert_eq!(result["status"], "completed");
    assert_eq!(result["execution_path"], serde_json::json!(["t0", "t1"]));
    assert_eq!(result["tasks"]["t1"]["result"]["matched_condition"], 0);
    assert!(temp
        .path()
        .join(".hephestos")
        .join("logs")
        .join("hephestos.log")
        .exists());
}

#[test]
fn run_exits_one_when_trigger_is_not_satisfied() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "order.json", ORDER_WORKFLOW);
    write(temp.path(), "context.json", r#"{"order": {"total": 20}}"#);

    hephestos(temp.path())
        .args(["run", "--workflow", "order.json", "--context", "context.json"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"status\": \"failed\""))
        .stdout(predicate::str::contains("trigger condition not satisfied"));
}

#[test]
fn run_writes_execution_record_when_state_dir_is_configured() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "order.json", ORDER_WORKFLOW);
    write(temp.path(), "context.json", r#"{"order": {"total": 500}}"#);
    write(
        temp.path(),
        ".hephestos/config/engine.toml",
        "[engine]\nstate_dir = \"state\"\n",
    );

    hephestos(temp.path())
        .args(["run", "--workflow", "order.json", "--context", "context.json"])
        .assert()
        .success();

    let records: Vec<_> = fs::read_dir(temp.path().join("state"))
        .expect("state dir")
        .filter_map(|entry| entry.ok())
        .collect();
    assert_eq!(records.len(), 1);
    let record: Value = serde_json::from_str(
        &fs::read_to_string(records[0].path().join("execution.json")).expect("record"),
    )
    .expect("record json");
    assert_eq!(record["state"], "COMPLETE");
    assert_eq!(record["status"], "SUCCESS");
}

#[test]
fn run_reports_missing_explicit_config() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "order.json", ORDER_WORKFLOW);

    hephestos(temp.path())
        .args(["run", "--workflow", "order.json", "--config", "missing.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn validate_reports_errors_and_exits_one() {
    let temp = TempDir::new().expect("temp dir");
    write(
        temp.path(),
        "broken.yaml",
        "trigger: start\ntasks:\n  t0:\n    type: delay\n    properties: {duration: 1, unit: seconds}\n    next: [ghost]\n",
    );

    hephestos(temp.path())
        .args(["validate", "--workflow", "broken.yaml"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("WFE-LINT-001"))
        .stdout(predicate::str::contains("WFE-LINT-002"));
}

#[test]
fn validate_clean_definition_as_json() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "order.json", ORDER_WORKFLOW);

    hephestos(temp.path())
        .args(["validate", "--workflow", "order.json", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn process_runs_every_definition_of_the_shop() {
    let temp = TempDir::new().expect("temp dir");
    write(temp.path(), "workflows/acme/a_order.json", ORDER_WORKFLOW);
    write(
        temp.path(),
        "workflows/acme/b_small.yaml",
        "trigger: t0\ntasks:\n  t0:\n    type: condition\n    properties:\n      condition_type: if\n      conditions:\n        - {field: order.total, operator: \"<\", value: 10}\n",
    );
    write(temp.path(), "event.json", r#"{"order": {"total": 150}}"#);

    let output = hephestos(temp.path())
        .args([
            "process",
            "--definitions",
            "workflows",
            "--shop",
            "acme",
            "--event",
            "event.json",
        ])
        .output()
        .expect("process");
    assert_eq!(output.status.code(), Some(0));

    let results: Value = serde_json::from_slice(&output.stdout).expect("json results");
    let statuses: Vec<&str> = results
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["status"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(statuses, vec!["completed", "failed"]);
}
