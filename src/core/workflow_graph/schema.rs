#![allow(clippy::result_large_err)] // Workflow schema APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

fn default_properties_value() -> Value {
    Value::Object(Map::new())
}

/// Kind of work a task node performs; selects the registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Condition,
    Action,
    Trigger,
    Http,
    Delay,
    Integration,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::Condition,
        TaskType::Action,
        TaskType::Trigger,
        TaskType::Http,
        TaskType::Delay,
        TaskType::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Condition => "condition",
            TaskType::Action => "action",
            TaskType::Trigger => "trigger",
            TaskType::Http => "http",
            TaskType::Delay => "delay",
            TaskType::Integration => "integration",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .iter()
            .copied()
            .find(|candidate| candidate.as_str() == value)
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::UnknownTaskType,
                    format!("unknown task type: {}", value),
                )
            })
    }
}

/// Per-node status, mutated once per visit by the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Pending,
    Completed,
    Failed,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Pending => "pending",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
        }
    }
}

/// Outcome-keyed successor ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchTargets {
    #[serde(rename = "true", default, skip_serializing_if = "Option::is_none")]
    pub on_true: Option<String>,
    #[serde(rename = "false", default, skip_serializing_if = "Option::is_none")]
    pub on_false: Option<String>,
}

/// Successor references of a node.
///
/// The list form follows only its first entry. The object form selects a
/// successor from the node's boolean outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Successors {
    Sequence(Vec<String>),
    Branch(BranchTargets),
}

impl Default for Successors {
    fn default() -> Self {
        Successors::Sequence(Vec::new())
    }
}

impl Successors {
    pub fn is_terminal(&self) -> bool {
        match self {
            Successors::Sequence(ids) => ids.is_empty(),
            Successors::Branch(targets) => targets.on_true.is_none() && targets.on_false.is_none(),
        }
    }

    /// Every node id referenced, in declaration order.
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Successors::Sequence(ids) => ids.iter().map(String::as_str).collect(),
            Successors::Branch(targets) => targets
                .on_true
                .iter()
                .chain(targets.on_false.iter())
                .map(String::as_str)
                .collect(),
        }
    }

    /// Pick the successor for a completed node with the given outcome.
    pub fn select(&self, outcome: bool) -> Option<&str> {
        match self {
            Successors::Sequence(ids) => ids.first().map(String::as_str),
            Successors::Branch(targets) => {
                if outcome {
                    targets.on_true.as_deref()
                } else {
                    targets.on_false.as_deref()
                }
            }
        }
    }
}

fn deserialize_successors<'de, D>(deserializer: D) -> Result<Successors, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Successors>::deserialize(deserializer)?.unwrap_or_default())
}

/// One step of a workflow graph, in its transport form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default = "default_properties_value")]
    pub properties: Value,
    #[serde(default, deserialize_with = "deserialize_successors")]
    pub next: Successors,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default)]
    pub result: Option<Value>,
}

impl TaskNode {
    pub fn new(id: impl Into<String>, task_type: TaskType, properties: Value) -> Self {
        Self {
            id: id.into(),
            task_type,
            properties,
            next: Successors::default(),
            status: NodeStatus::Pending,
            result: None,
        }
    }

    pub fn with_next<I, S>(mut self, next: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.next = Successors::Sequence(next.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_branches(mut self, on_true: Option<&str>, on_false: Option<&str>) -> Self {
        self.next = Successors::Branch(BranchTargets {
            on_true: on_true.map(str::to_string),
            on_false: on_false.map(str::to_string),
        });
        self
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: Value) -> Result<Self, AppError> {
        serde_json::from_value(value).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("invalid task node: {}", err),
            )
        })
    }
}

/// Immutable workflow template: trigger id plus the node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub tasks: IndexMap<String, TaskNode>,
}

impl WorkflowDefinition {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            tasks: IndexMap::new(),
        }
    }

    pub fn with_task(mut self, node: TaskNode) -> Self {
        self.tasks.insert(node.id.clone(), node);
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self, AppError> {
        let definition: WorkflowDefinition = serde_json::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse workflow definition: {}", err),
            )
        })?;
        definition.normalized()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, AppError> {
        let definition: WorkflowDefinition = serde_yaml::from_str(text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse workflow definition: {}", err),
            )
        })?;
        definition.normalized()
    }

    pub fn from_value(value: Value) -> Result<Self, AppError> {
        let definition: WorkflowDefinition = serde_json::from_value(value).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse workflow definition: {}", err),
            )
        })?;
        definition.normalized()
    }

    /// Load a definition from a `.json`, `.yaml` or `.yml` file.
    pub fn load_from_file(path: &Path) -> Result<Self, AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        };
        parsed.map_err(|err| err.with_context(path.display().to_string()))
    }

    /// Fill missing node ids from their table keys and reject mismatches.
    fn normalized(mut self) -> Result<Self, AppError> {
        for (key, node) in self.tasks.iter_mut() {
            if node.id.is_empty() {
                node.id = key.clone();
            } else if node.id != *key {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("task '{}' declares mismatched id '{}'", key, node.id),
                ));
            }
        }
        Ok(self)
    }

    pub fn trigger_node(&self) -> Option<&TaskNode> {
        if self.trigger.is_empty() {
            return None;
        }
        self.tasks.get(&self.trigger)
    }

    /// SHA-256 of the definition's JSON encoding, lowercase hex.
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hex::encode(hasher.finalize())
    }
}
