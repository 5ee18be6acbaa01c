#![allow(clippy::result_large_err)]

//! Fans one incoming event out to every workflow definition saved for its shop.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::executor::{ExecutionResult, WorkflowExecutor};
use crate::core::workflow_graph::schema::WorkflowDefinition;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Source of the workflow definitions subscribed by a shop.
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn definitions_for_shop(
        &self,
        shop: &str,
    ) -> Result<Vec<Arc<WorkflowDefinition>>, AppError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    definitions: RwLock<HashMap<String, Vec<Arc<WorkflowDefinition>>>>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, shop: impl Into<String>, definition: WorkflowDefinition) {
        let mut guard = match self.definitions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(shop.into())
            .or_default()
            .push(Arc::new(definition));
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn definitions_for_shop(
        &self,
        shop: &str,
    ) -> Result<Vec<Arc<WorkflowDefinition>>, AppError> {
        let guard = self.definitions.read().map_err(|_| {
            AppError::new(ErrorCategory::InternalError, "definition store lock poisoned")
        })?;
        Ok(guard.get(shop).cloned().unwrap_or_default())
    }
}

/// Reads `<root>/<shop>/*.json`, `*.yaml` and `*.yml` in file-name order.
#[derive(Debug, Clone)]
pub struct DirectoryDefinitionStore {
    root: PathBuf,
}

impl DirectoryDefinitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn shop_dir(&self, shop: &str) -> Result<PathBuf, AppError> {
        let valid = !shop.is_empty()
            && shop != "."
            && shop != ".."
            && !shop.contains(['/', '\\']);
        if !valid {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("invalid shop identifier '{}'", shop),
            ));
        }
        Ok(self.root.join(shop))
    }

    fn load_dir(dir: &Path) -> Result<Vec<Arc<WorkflowDefinition>>, AppError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|ext| ext.to_str()),
                        Some("json") | Some("yaml") | Some("yml")
                    )
            })
            .collect();
        paths.sort();

        let mut definitions = Vec::with_capacity(paths.len());
        for path in paths {
            match WorkflowDefinition::load_from_file(&path) {
                Ok(definition) => definitions.push(Arc::new(definition)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable workflow definition");
                }
            }
        }
        Ok(definitions)
    }
}

#[async_trait]
impl DefinitionStore for DirectoryDefinitionStore {
    async fn definitions_for_shop(
        &self,
        shop: &str,
    ) -> Result<Vec<Arc<WorkflowDefinition>>, AppError> {
        let dir = self.shop_dir(shop)?;
        tokio::task::spawn_blocking(move || Self::load_dir(&dir))
            .await
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("definition loader failed: {}", err),
                )
            })?
    }
}

/// One webhook delivery, already reduced to its shop and execution context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub shop: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl WorkflowEvent {
    pub fn new(shop: impl Into<String>, context: Map<String, Value>) -> Self {
        Self {
            shop: shop.into(),
            context,
        }
    }
}

pub struct EventProcessor {
    executor: WorkflowExecutor,
    store: Arc<dyn DefinitionStore>,
    limit: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl EventProcessor {
    pub fn new(
        executor: WorkflowExecutor,
        store: Arc<dyn DefinitionStore>,
        max_concurrent_executions: usize,
    ) -> Self {
        Self {
            executor,
            store,
            limit: Arc::new(Semaphore::new(max_concurrent_executions.max(1))),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancels every execution started by this processor, including ones in flight.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run every definition of the event's shop; results follow store order.
    pub async fn process(&self, event: WorkflowEvent) -> Result<Vec<ExecutionResult>, AppError> {
        let definitions = self.store.definitions_for_shop(&event.shop).await?;
        tracing::info!(shop = %event.shop, definitions = definitions.len(), "processing workflow event");

        let context = Arc::new(event.context);
        let handles: Vec<_> = definitions
            .iter()
            .map(|definition| {
                let executor = self.executor.clone();
                let limit = Arc::clone(&self.limit);
                let context = Arc::clone(&context);
                let cancel = self.cancel.child_token();
                let definition = Arc::clone(definition);
                tokio::spawn(async move {
                    let _permit = limit.acquire_owned().await.map_err(|_| {
                        AppError::new(ErrorCategory::InternalError, "execution limiter closed")
                    })?;
                    Ok::<_, AppError>(
                        executor
                            .execute_with_cancel(definition, (*context).clone(), cancel)
                            .await,
                    )
                })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (definition, joined) in definitions.iter().zip(join_all(handles).await) {
            let result = match joined {
                Ok(Ok(result)) => result,
                Ok(Err(err)) => ExecutionResult::aborted(definition, err),
                Err(err) => ExecutionResult::aborted(
                    definition,
                    AppError::new(
                        ErrorCategory::InternalError,
                        format!("workflow execution task failed: {}", err),
                    ),
                ),
            };
            results.push(result);
        }

        let completed = results.iter().filter(|result| result.is_completed()).count();
        tracing::info!(
            shop = %event.shop,
            completed,
            failed = results.len() - completed,
            "workflow event processed"
        );
        Ok(results)
    }
}
