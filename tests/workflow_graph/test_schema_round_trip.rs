use hephestos::core::types::ErrorCategory;
use hephestos::core::workflow_graph::schema::{
    NodeStatus, Successors, TaskNode, TaskType, WorkflowDefinition,
};
use serde_json::json;
use std::fs;
use tempfile::TempDir;

const ORDER_PAID_YAML: &str = r#"
trigger: big_order
tasks:
  big_order:
    type: condition
    properties:
      condition_type: if
      conditions:
        - field: order.total
          operator: ">"
          value: 100
    next:
      "true": notify
      "false": tag_small
  notify:
    type: http
    properties:
      url: https://hooks.example.com/orders
      method: POST
      headers:
        Content-Type: application/json
      body:
        text: big order
  tag_small:
    type: delay
    properties:
      duration: 10
      unit: minutes
"#;

#[test]
fn task_node_survives_a_json_round_trip() {
    let node = TaskNode::new(
        "notify",
        TaskType::Http,
        json!({"url": "https://hooks.example.com", "method": "POST"}),
    )
    .with_next(["done"]);
    let value = node.to_value().expect("to_value");
    assert_eq!(value["type"], "http");
    assert_eq!(value["status"], "pending");
    assert_eq!(value["next"], json!(["done"]));
    assert_eq!(TaskNode::from_value(value).expect("from_value"), node);
}

#[test]
fn yaml_definition_parses_branch_successors() {
    let definition = WorkflowDefinition::from_yaml_str(ORDER_PAID_YAML).expect("parse yaml");
    assert_eq!(definition.trigger, "big_order");
    assert_eq!(
        definition.tasks.keys().collect::<Vec<_>>(),
        vec!["big_order", "notify", "tag_small"]
    );
    let trigger = definition.trigger_node().expect("trigger node");
    assert_eq!(trigger.task_type, TaskType::Condition);
    assert_eq!(trigger.next.select(true), Some("notify"));
    assert_eq!(trigger.next.select(false), Some("tag_small"));
    assert!(definition.tasks["notify"].next.is_terminal());
    assert_eq!(definition.tasks["tag_small"].status, NodeStatus::Pending);
}

#[test]
fn json_and_yaml_files_load_by_extension() {
    let dir = TempDir::new().expect("temp dir");
    let yaml_path = dir.path().join("order.yml");
    fs::write(&yaml_path, ORDER_PAID_YAML).expect("write yaml");
    let from_yaml = WorkflowDefinition::load_from_file(&yaml_path).expect("load yaml");

    let json_path = dir.path().join("order.json");
    fs::write(&json_path, serde_json::to_string(&from_yaml).unwrap()).expect("write json");
    let from_json = WorkflowDefinition::load_from_file(&json_path).expect("load json");

    assert_eq!(from_yaml, from_json);
    assert_eq!(from_yaml.content_hash(), from_json.content_hash());
}

#[test]
fn other_extensions_are_read_as_json() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("order.txt");
    fs::write(&path, ORDER_PAID_YAML).expect("write");
    assert!(WorkflowDefinition::load_from_file(&path).is_err());
}

#[test]
fn unknown_task_type_fails_to_parse() {
    let err = WorkflowDefinition::from_json_str(
        r#"{"trigger": "t0", "tasks": {"t0": {"type": "sms", "properties": {}}}}"#,
    )
    .unwrap_err();
    assert_eq!(err.category, ErrorCategory::SerializationError);
}

#[test]
fn content_hash_changes_with_the_graph() {
    let base = WorkflowDefinition::new("t0").with_task(TaskNode::new(
        "t0",
        TaskType::Delay,
        json!({"duration": 1, "unit": "seconds"}),
    ));
    let extended = base.clone().with_task(
        TaskNode::new("t1", TaskType::Delay, json!({"duration": 2, "unit": "seconds"})),
    );
    assert_eq!(base.content_hash().len(), 64);
    assert_ne!(base.content_hash(), extended.content_hash());
}

#[test]
fn builder_branches_serialize_as_outcome_map() {
    let node = TaskNode::new("c", TaskType::Condition, json!({}))
        .with_branches(Some("yes"), None);
    let value = node.to_value().expect("to_value");
    assert_eq!(value["next"], json!({"true": "yes"}));
    assert!(matches!(node.next, Successors::Branch(_)));
    assert_eq!(node.next.select(false), None);
}
