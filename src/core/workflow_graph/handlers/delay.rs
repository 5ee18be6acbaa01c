#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::properties::TaskProperties;
use crate::core::workflow_graph::registry::{HandlerOutput, TaskContext, TaskHandler};
use crate::core::workflow_graph::schema::TaskType;
use async_trait::async_trait;
use serde_json::{json, Value};

/// Asks the executor to suspend the run; the node completes once the timer fires.
pub struct DelayTaskHandler;

impl Default for DelayTaskHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayTaskHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskHandler for DelayTaskHandler {
    async fn execute(
        &self,
        properties: &Value,
        ctx: &TaskContext,
    ) -> Result<HandlerOutput, AppError> {
        let props = match TaskProperties::parse(TaskType::Delay, properties)? {
            TaskProperties::Delay(props) => props,
            _ => {
                return Err(AppError::new(
                    ErrorCategory::InvalidProperties,
                    "Invalid properties for task type: delay",
                ))
            }
        };
        tracing::debug!(node_id = %ctx.node_id, delay = %props.describe(), "scheduling resumption");
        Ok(HandlerOutput::Suspend {
            duration: props.as_duration()?,
            on_resume: json!({ "delayed_for": props.describe() }),
        })
    }
}
