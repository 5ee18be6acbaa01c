#![allow(clippy::result_large_err)] // Sink module returns AppError to preserve structured diagnostic context.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::state::WorkflowExecutionRecord;
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Receives a full record snapshot after every execution transition.
#[async_trait]
pub trait ExecutionSink: Send + Sync {
    async fn persist(&self, record: &WorkflowExecutionRecord) -> Result<(), AppError>;
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl ExecutionSink for NoopSink {
    async fn persist(&self, _record: &WorkflowExecutionRecord) -> Result<(), AppError> {
        Ok(())
    }
}

/// Keeps every snapshot in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Mutex<Vec<WorkflowExecutionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<WorkflowExecutionRecord> {
        match self.snapshots.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn latest(&self, execution_id: Uuid) -> Option<WorkflowExecutionRecord> {
        self.snapshots()
            .into_iter()
            .rev()
            .find(|record| record.execution_id == execution_id)
    }
}

#[async_trait]
impl ExecutionSink for MemorySink {
    async fn persist(&self, record: &WorkflowExecutionRecord) -> Result<(), AppError> {
        let mut guard = self.snapshots.lock().map_err(|_| {
            AppError::new(ErrorCategory::InternalError, "memory sink lock poisoned")
        })?;
        guard.push(record.clone());
        Ok(())
    }
}

/// Writes `<root>/<execution_id>/execution.json`, replacing it atomically.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    root: PathBuf,
}

impl JsonFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn record_path(&self, execution_id: &Uuid) -> PathBuf {
        self.root
            .join(execution_id.to_string())
            .join("execution.json")
    }

    pub fn load(&self, execution_id: &Uuid) -> Result<WorkflowExecutionRecord, AppError> {
        let path = self.record_path(execution_id);
        let bytes = fs::read(&path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        serde_json::from_slice(&bytes).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse {}: {}", path.display(), err),
            )
        })
    }
}

#[async_trait]
impl ExecutionSink for JsonFileSink {
    async fn persist(&self, record: &WorkflowExecutionRecord) -> Result<(), AppError> {
        let path = self.record_path(&record.execution_id);
        let content = serde_json::to_vec_pretty(record).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to serialize execution.json: {}", err),
            )
        })?;
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("execution record writer failed: {}", err),
                )
            })?
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
    })?;
    Ok(())
}
