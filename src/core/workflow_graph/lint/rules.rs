use super::{LintResult, LintSeverity, WorkflowLintRule};
use crate::core::workflow_graph::condition::{ComparisonOperator, ConditionType};
use crate::core::workflow_graph::properties::TaskProperties;
use crate::core::workflow_graph::registry::TaskRegistry;
use crate::core::workflow_graph::schema::{Successors, TaskType, WorkflowDefinition};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};

pub fn built_in_rules() -> Vec<Box<dyn WorkflowLintRule>> {
    vec![
        Box::new(MissingTriggerRule),
        Box::new(UnknownSuccessorRule),
        Box::new(InvalidPropertiesRule),
        Box::new(UnregisteredTaskTypeRule),
        Box::new(ConditionVocabularyRule),
        Box::new(UnreachableTasksRule),
        Box::new(CycleRule),
        Box::new(IgnoredSuccessorsRule),
    ]
}

struct MissingTriggerRule;

impl WorkflowLintRule for MissingTriggerRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        if workflow.trigger_node().is_some() {
            return Vec::new();
        }
        let message = if workflow.trigger.is_empty() {
            "workflow has no trigger".to_string()
        } else {
            format!("trigger '{}' is not defined in tasks", workflow.trigger)
        };
        vec![LintResult::new(
            "WFE-LINT-001",
            LintSeverity::Error,
            message,
            None,
            Some("set trigger to the id of an existing task".to_string()),
        )]
    }
}

struct UnknownSuccessorRule;

impl WorkflowLintRule for UnknownSuccessorRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        let mut out = Vec::new();
        for (id, node) in &workflow.tasks {
            for target in node.next.targets() {
                if !workflow.tasks.contains_key(target) {
                    out.push(LintResult::new(
                        "WFE-LINT-002",
                        LintSeverity::Error,
                        format!("task '{}' references unknown successor '{}'", id, target),
                        Some(id.clone()),
                        Some("point next at an existing task id".to_string()),
                    ));
                }
            }
        }
        out
    }
}

struct InvalidPropertiesRule;

impl WorkflowLintRule for InvalidPropertiesRule {
    fn validate(&self, workflow: &WorkflowDefinition, registry: &TaskRegistry) -> Vec<LintResult> {
        let mut out = Vec::new();
        for (id, node) in &workflow.tasks {
            let message = match TaskProperties::parse(node.task_type, &node.properties) {
                Err(err) => Some(err.message),
                Ok(_) if !registry.validate(node.task_type, &node.properties) => Some(format!(
                    "Invalid properties for task type: {}",
                    node.task_type
                )),
                Ok(_) => None,
            };
            if let Some(message) = message {
                out.push(LintResult::new(
                    "WFE-LINT-003",
                    LintSeverity::Error,
                    message,
                    Some(id.clone()),
                    None,
                ));
            }
        }
        out
    }
}

struct UnregisteredTaskTypeRule;

impl WorkflowLintRule for UnregisteredTaskTypeRule {
    fn validate(&self, workflow: &WorkflowDefinition, registry: &TaskRegistry) -> Vec<LintResult> {
        workflow
            .tasks
            .iter()
            .filter(|(_, node)| !registry.contains(node.task_type))
            .map(|(id, node)| {
                LintResult::new(
                    "WFE-LINT-004",
                    LintSeverity::Error,
                    format!("no handler registered for task type '{}'", node.task_type),
                    Some(id.clone()),
                    Some("register a handler for this type before running".to_string()),
                )
            })
            .collect()
    }
}

/// Condition types and operators are only checked by the evaluator at run
/// time; surface them here before execution.
struct ConditionVocabularyRule;

impl WorkflowLintRule for ConditionVocabularyRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        let mut out = Vec::new();
        for (id, node) in &workflow.tasks {
            if node.task_type != TaskType::Condition {
                continue;
            }
            let Ok(TaskProperties::Condition(props)) =
                TaskProperties::parse(node.task_type, &node.properties)
            else {
                continue;
            };
            let condition_type = match props.condition_type.parse::<ConditionType>() {
                Ok(condition_type) => condition_type,
                Err(err) => {
                    out.push(LintResult::new(
                        "WFE-LINT-005",
                        LintSeverity::Error,
                        err.to_string(),
                        Some(id.clone()),
                        Some("use one of: if, if-elseif, switch".to_string()),
                    ));
                    continue;
                }
            };
            for (index, condition) in props.conditions.iter().enumerate() {
                if let Err(err) = condition.operator.parse::<ComparisonOperator>() {
                    let severity = if condition_type == ConditionType::Switch {
                        LintSeverity::Info
                    } else {
                        LintSeverity::Error
                    };
                    out.push(LintResult::new(
                        "WFE-LINT-006",
                        severity,
                        format!("condition {}: {}", index, err),
                        Some(id.clone()),
                        Some("use one of: =, <, >, <=, >=".to_string()),
                    ));
                }
            }
        }
        out
    }
}

struct UnreachableTasksRule;

impl WorkflowLintRule for UnreachableTasksRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        let (graph, node_map) = build_task_graph(workflow);
        let Some(&start) = node_map.get(workflow.trigger.as_str()) else {
            return Vec::new();
        };

        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, start);
        while let Some(idx) = dfs.next(&graph) {
            reachable.insert(idx);
        }

        workflow
            .tasks
            .keys()
            .filter(|id| {
                node_map
                    .get(id.as_str())
                    .map(|idx| !reachable.contains(idx))
                    .unwrap_or(false)
            })
            .map(|id| {
                LintResult::new(
                    "WFE-LINT-007",
                    LintSeverity::Warning,
                    format!("task '{}' is unreachable from trigger '{}'", id, workflow.trigger),
                    Some(id.clone()),
                    Some("connect the task or remove it".to_string()),
                )
            })
            .collect()
    }
}

struct CycleRule;

impl WorkflowLintRule for CycleRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        let (graph, node_map) = build_task_graph(workflow);
        let names: HashMap<NodeIndex, &str> =
            node_map.iter().map(|(id, idx)| (*idx, *id)).collect();

        let mut out = Vec::new();
        for component in tarjan_scc(&graph) {
            let is_cycle = component.len() > 1
                || component
                    .first()
                    .map(|idx| graph.contains_edge(*idx, *idx))
                    .unwrap_or(false);
            if !is_cycle {
                continue;
            }
            let mut members: Vec<&str> = component
                .iter()
                .filter_map(|idx| names.get(idx).copied())
                .collect();
            members.sort_unstable();
            out.push(LintResult::new(
                "WFE-LINT-008",
                LintSeverity::Warning,
                format!(
                    "tasks [{}] form a cycle; execution relies on max_steps to stop",
                    members.join(", ")
                ),
                members.first().map(|id| id.to_string()),
                None,
            ));
        }
        out
    }
}

struct IgnoredSuccessorsRule;

impl WorkflowLintRule for IgnoredSuccessorsRule {
    fn validate(&self, workflow: &WorkflowDefinition, _registry: &TaskRegistry) -> Vec<LintResult> {
        let mut out = Vec::new();
        for (id, node) in &workflow.tasks {
            if let Successors::Sequence(ids) = &node.next {
                if ids.len() > 1 {
                    out.push(LintResult::new(
                        "WFE-LINT-009",
                        LintSeverity::Warning,
                        format!(
                            "task '{}' lists {} successors; only '{}' is followed",
                            id,
                            ids.len(),
                            ids[0]
                        ),
                        Some(id.clone()),
                        Some("use {\"true\": id, \"false\": id} to branch".to_string()),
                    ));
                }
            }
        }
        out
    }
}

fn build_task_graph(workflow: &WorkflowDefinition) -> (DiGraph<(), ()>, HashMap<&str, NodeIndex>) {
    let mut graph = DiGraph::<(), ()>::new();
    let mut node_map: HashMap<&str, NodeIndex> = HashMap::new();

    for id in workflow.tasks.keys() {
        node_map.insert(id.as_str(), graph.add_node(()));
    }

    for (id, node) in &workflow.tasks {
        if let Some(&from) = node_map.get(id.as_str()) {
            for target in followed_targets(&node.next) {
                if let Some(&to) = node_map.get(target) {
                    graph.add_edge(from, to, ());
                }
            }
        }
    }

    (graph, node_map)
}

/// Successors the executor can actually select.
fn followed_targets(next: &Successors) -> Vec<&str> {
    let mut targets = Vec::new();
    for outcome in [true, false] {
        if let Some(target) = next.select(outcome) {
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }
    targets
}
