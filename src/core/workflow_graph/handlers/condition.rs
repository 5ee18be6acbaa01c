#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::condition::evaluate_group;
use crate::core::workflow_graph::properties::TaskProperties;
use crate::core::workflow_graph::registry::{HandlerOutput, TaskContext, TaskHandler};
use crate::core::workflow_graph::schema::TaskType;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Evaluates a condition group against the execution context overlaid with
/// `properties.context`.
pub struct ConditionTaskHandler;

impl Default for ConditionTaskHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionTaskHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for ConditionTaskHandler {
    async fn execute(
        &self,
        properties: &Value,
        ctx: &TaskContext,
    ) -> Result<HandlerOutput, AppError> {
        let props = match TaskProperties::parse(TaskType::Condition, properties)? {
            TaskProperties::Condition(props) => props,
            _ => {
                return Err(AppError::new(
                    ErrorCategory::InvalidProperties,
                    "Invalid properties for task type: condition",
                ))
            }
        };

        let mut scope = (*ctx.context).clone();
        scope.extend(props.context);

        let outcome = evaluate_group(&props.condition_type, &props.conditions, &scope)?;
        tracing::debug!(
            node_id = %ctx.node_id,
            condition_type = %props.condition_type,
            matched = outcome.matched,
            "condition evaluated"
        );
        Ok(HandlerOutput::Completed(json!({
            "result": outcome.matched,
            "matched_condition": outcome.index,
        })))
    }
}
