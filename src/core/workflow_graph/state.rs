#![allow(clippy::result_large_err)] // State module returns AppError to preserve structured diagnostic context; boxing would discard run-time state.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::dispatcher::DispatchError;
use crate::core::workflow_graph::schema::{NodeStatus, TaskType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Version embedded in persisted execution records.
pub const EXECUTION_RECORD_FORMAT_VERSION: &str = "1";

/// Lifecycle position of one execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    New,
    InProgress,
    Pause,
    Retry,
    Complete,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::New => "NEW",
            ExecutionState::InProgress => "IN_PROGRESS",
            ExecutionState::Pause => "PAUSE",
            ExecutionState::Retry => "RETRY",
            ExecutionState::Complete => "COMPLETE",
        }
    }

    fn can_transition_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (New, InProgress)
                | (InProgress, Complete)
                | (InProgress, Retry)
                | (InProgress, Pause)
                | (Retry, InProgress)
                | (Pause, InProgress)
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one execution as seen by callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One dispatch outcome appended to `execution_history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutcomeRecord {
    pub node_id: String,
    pub task_type: TaskType,
    pub status: NodeStatus,
    /// 1 for the first dispatch of this visit, incremented per retry.
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
    pub recorded_at: DateTime<Utc>,
}

/// Workflow execution record persisted through an `ExecutionSink`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionRecord {
    pub format_version: String,
    pub execution_id: Uuid,
    pub workflow_hash: String,
    pub state: ExecutionState,
    pub status: ExecutionStatus,
    pub retry_count: u32,
    #[serde(default)]
    pub execution_history: Vec<NodeOutcomeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub start_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl WorkflowExecutionRecord {
    pub fn new(execution_id: Uuid, workflow_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        WorkflowExecutionRecord {
            format_version: EXECUTION_RECORD_FORMAT_VERSION.to_string(),
            execution_id,
            workflow_hash: workflow_hash.into(),
            state: ExecutionState::New,
            status: ExecutionStatus::Pending,
            retry_count: 0,
            execution_history: Vec::new(),
            error_message: None,
            start_time: now,
            update_time: now,
            end_time: None,
            duration_ms: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph.
    pub fn transition(&mut self, next: ExecutionState) -> Result<(), AppError> {
        if self.is_closed() {
            return Err(AppError::new(
                ErrorCategory::InternalError,
                format!(
                    "execution {} is closed; cannot move to {}",
                    self.execution_id, next
                ),
            ));
        }
        if !self.state.can_transition_to(next) {
            return Err(AppError::new(
                ErrorCategory::InternalError,
                format!("invalid execution transition {} -> {}", self.state, next),
            ));
        }
        tracing::trace!(execution_id = %self.execution_id, from = %self.state, to = %next, "execution transition");
        self.state = next;
        match next {
            ExecutionState::InProgress => self.status = ExecutionStatus::Running,
            ExecutionState::Retry => self.retry_count += 1,
            ExecutionState::Complete => {
                self.status = ExecutionStatus::Success;
                self.close();
            }
            ExecutionState::New | ExecutionState::Pause => {}
        }
        self.update_time = Utc::now();
        Ok(())
    }

    /// Terminal failure from any open state.
    pub fn fail(&mut self, message: impl Into<String>) {
        if self.is_closed() {
            return;
        }
        self.status = ExecutionStatus::Failed;
        self.error_message = Some(message.into());
        self.close();
    }

    pub fn record_outcome(&mut self, outcome: NodeOutcomeRecord) {
        self.execution_history.push(outcome);
        self.update_time = Utc::now();
    }

    fn close(&mut self) {
        let now = Utc::now();
        self.end_time = Some(now);
        self.update_time = now;
        self.duration_ms = Some(
            now.signed_duration_since(self.start_time)
                .num_milliseconds()
                .max(0),
        );
    }
}
