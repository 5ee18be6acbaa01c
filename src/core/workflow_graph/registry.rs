#![allow(clippy::result_large_err)] // Registry returns AppError directly for structured diagnostics without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::schema::TaskType;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Execution-scoped data handed to every handler invocation.
#[derive(Clone, Debug)]
pub struct TaskContext {
    pub execution_id: Uuid,
    pub node_id: String,
    /// Caller-supplied bindings (order, shop, raw payload, ...).
    pub context: Arc<Map<String, Value>>,
}

impl TaskContext {
    pub fn new(execution_id: Uuid, node_id: impl Into<String>, context: Arc<Map<String, Value>>) -> Self {
        Self {
            execution_id,
            node_id: node_id.into(),
            context,
        }
    }
}

/// What a handler asks the executor to do next.
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerOutput {
    Completed(Value),
    /// Yield the execution for `duration`; `on_resume` becomes the node result.
    Suspend { duration: Duration, on_resume: Value },
}

/// Trait implemented by task-type providers.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn execute(&self, properties: &Value, ctx: &TaskContext) -> Result<HandlerOutput, AppError>;
}

/// Property validator; `false` rejects the node before its handler runs.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Adapter registering a plain synchronous function as a handler.
pub struct FnHandler<F> {
    func: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Value, &TaskContext) -> Result<Value, AppError> + Send + Sync + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F> TaskHandler for FnHandler<F>
where
    F: Fn(&Value, &TaskContext) -> Result<Value, AppError> + Send + Sync + 'static,
{
    async fn execute(&self, properties: &Value, ctx: &TaskContext) -> Result<HandlerOutput, AppError> {
        (self.func)(properties, ctx).map(HandlerOutput::Completed)
    }
}

/// Data-driven registration entry.
pub struct TaskEntry {
    pub task_type: TaskType,
    pub handler: Arc<dyn TaskHandler>,
    pub validator: Option<Validator>,
}

impl TaskEntry {
    pub fn new<H: TaskHandler>(task_type: TaskType, handler: H) -> Self {
        Self {
            task_type,
            handler: Arc::new(handler),
            validator: None,
        }
    }

    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

#[derive(Clone)]
struct RegisteredTask {
    handler: Arc<dyn TaskHandler>,
    validator: Option<Validator>,
}

/// Builder used to register task types before any execution starts.
pub struct TaskRegistryBuilder {
    entries: HashMap<TaskType, RegisteredTask>,
}

impl Default for TaskRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistryBuilder {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a handler; a second registration for the same type fails and
    /// leaves the first one in place.
    pub fn register<H: TaskHandler>(
        &mut self,
        task_type: TaskType,
        handler: H,
        validator: Option<Validator>,
    ) -> Result<&mut Self, AppError> {
        self.register_entry(TaskEntry {
            task_type,
            handler: Arc::new(handler),
            validator,
        })
    }

    pub fn register_entry(&mut self, entry: TaskEntry) -> Result<&mut Self, AppError> {
        if self.entries.contains_key(&entry.task_type) {
            return Err(AppError::new(
                ErrorCategory::DuplicateRegistration,
                format!("handler already registered for task type: {}", entry.task_type),
            ));
        }
        tracing::debug!(task_type = %entry.task_type, validated = entry.validator.is_some(), "registered task type");
        self.entries.insert(
            entry.task_type,
            RegisteredTask {
                handler: entry.handler,
                validator: entry.validator,
            },
        );
        Ok(self)
    }

    pub fn build(self) -> TaskRegistry {
        TaskRegistry {
            inner: Arc::new(self.entries),
        }
    }
}

/// Immutable registry shared by every execution.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<HashMap<TaskType, RegisteredTask>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        TaskRegistryBuilder::new().build()
    }

    pub fn builder() -> TaskRegistryBuilder {
        TaskRegistryBuilder::new()
    }

    pub fn get_handler(&self, task_type: TaskType) -> Result<Arc<dyn TaskHandler>, AppError> {
        self.inner
            .get(&task_type)
            .map(|entry| Arc::clone(&entry.handler))
            .ok_or_else(|| {
                AppError::new(
                    ErrorCategory::UnknownTaskType,
                    format!("No handler registered for task type: {}", task_type),
                )
            })
    }

    /// Types without a validator accept any properties.
    pub fn validate(&self, task_type: TaskType, properties: &Value) -> bool {
        match self.inner.get(&task_type).and_then(|entry| entry.validator.as_ref()) {
            Some(validator) => validator(properties),
            None => true,
        }
    }

    pub fn contains(&self, task_type: TaskType) -> bool {
        self.inner.contains_key(&task_type)
    }

    pub fn task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> = self.inner.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}
