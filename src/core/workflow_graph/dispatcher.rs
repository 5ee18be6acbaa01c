//! Validates a node's properties, runs its registered handler and folds every
//! handler failure into a [`DispatchOutcome`].

use crate::core::error::{codes, AppError};
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::registry::{HandlerOutput, TaskContext, TaskRegistry};
use crate::core::workflow_graph::schema::{NodeStatus, TaskNode};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::timeout;

/// Error kind and message recorded on a failed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchError {
    pub kind: ErrorCategory,
    pub code: String,
    pub message: String,
}

impl DispatchError {
    pub fn to_value(&self) -> Value {
        json!({
            "error": self.message,
            "kind": self.kind,
            "code": self.code,
        })
    }
}

impl From<AppError> for DispatchError {
    fn from(err: AppError) -> Self {
        Self {
            kind: err.category,
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed { result: Value },
    Failed { error: DispatchError },
    Suspended { duration: Duration, on_resume: Value },
}

impl DispatchOutcome {
    /// Node status this outcome settles to; suspensions stay pending.
    pub fn status(&self) -> NodeStatus {
        match self {
            DispatchOutcome::Completed { .. } => NodeStatus::Completed,
            DispatchOutcome::Failed { .. } => NodeStatus::Failed,
            DispatchOutcome::Suspended { .. } => NodeStatus::Pending,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed { .. })
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            DispatchOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    fn failed(err: AppError) -> Self {
        DispatchOutcome::Failed { error: err.into() }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: TaskRegistry,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            handler_timeout: None,
        }
    }

    pub fn with_handler_timeout(mut self, handler_timeout: Option<Duration>) -> Self {
        self.handler_timeout = handler_timeout;
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub async fn execute(&self, node: &TaskNode, ctx: &TaskContext) -> DispatchOutcome {
        if !self.registry.validate(node.task_type, &node.properties) {
            tracing::debug!(node_id = %node.id, task_type = %node.task_type, "properties rejected by validator");
            return DispatchOutcome::failed(AppError::new(
                ErrorCategory::InvalidProperties,
                format!("Invalid properties for task type: {}", node.task_type),
            ));
        }

        let handler = match self.registry.get_handler(node.task_type) {
            Ok(handler) => handler,
            Err(err) => return DispatchOutcome::failed(err),
        };

        let invocation = AssertUnwindSafe(handler.execute(&node.properties, ctx)).catch_unwind();
        let joined = match self.handler_timeout {
            Some(limit) => match timeout(limit, invocation).await {
                Ok(joined) => joined,
                Err(_) => {
                    return DispatchOutcome::failed(
                        AppError::new(
                            ErrorCategory::HandlerFailure,
                            format!("task {} timed out after {}ms", node.id, limit.as_millis()),
                        )
                        .with_code(codes::HANDLER_TIMEOUT),
                    )
                }
            },
            None => invocation.await,
        };

        match joined {
            Ok(Ok(HandlerOutput::Completed(result))) => DispatchOutcome::Completed { result },
            Ok(Ok(HandlerOutput::Suspend {
                duration,
                on_resume,
            })) => DispatchOutcome::Suspended {
                duration,
                on_resume,
            },
            Ok(Err(err)) => {
                tracing::debug!(node_id = %node.id, code = %err.code, error = %err.message, "handler failed");
                DispatchOutcome::failed(err)
            }
            Err(_) => DispatchOutcome::failed(AppError::new(
                ErrorCategory::InternalError,
                format!("handler for task {} panicked", node.id),
            )),
        }
    }
}
