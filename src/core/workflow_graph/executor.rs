#![allow(clippy::result_large_err)] // Executor returns AppError to preserve full diagnostic context; boxing would discard run-time state.

use crate::core::config::EngineConfig;
use crate::core::error::{codes, AppError};
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
use crate::core::workflow_graph::properties::TaskProperties;
use crate::core::workflow_graph::registry::TaskContext;
use crate::core::workflow_graph::schema::{NodeStatus, TaskNode, TaskType, WorkflowDefinition};
use crate::core::workflow_graph::sink::{ExecutionSink, NoopSink};
use crate::core::workflow_graph::state::{
    ExecutionState, NodeOutcomeRecord, WorkflowExecutionRecord,
};
use chrono::Utc;
use indexmap::IndexMap;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const TRIGGER_NOT_SATISFIED: &str = "trigger condition not satisfied";
const MAX_BACKOFF_SECS: f64 = 3600.0;

/// Retry bound and backoff schedule for handler failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
    pub multiplier: f64,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
            multiplier: config.retry_backoff_multiplier,
            jitter: config.retry_jitter,
        }
    }

    /// Wait before the `retry`-th retry (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let base = if secs.is_finite() {
            Duration::from_secs_f64(secs.clamp(0.0, MAX_BACKOFF_SECS))
        } else {
            Duration::from_secs_f64(MAX_BACKOFF_SECS)
        };
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms > 0 {
            base + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        } else {
            base
        }
    }
}

/// Resolved executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub retry: RetryPolicy,
    pub max_steps: usize,
    pub preflight_validation: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ExecutorSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(config),
            max_steps: config.max_steps,
            preflight_validation: config.preflight_validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
        }
    }
}

/// Final result of one execution. Serializes to
/// `{status, execution_path, tasks, error?, error_code?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    #[serde(skip)]
    pub execution_id: Uuid,
    pub status: ResultStatus,
    pub execution_path: Vec<String>,
    pub tasks: IndexMap<String, TaskNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip)]
    pub record: WorkflowExecutionRecord,
}

impl ExecutionResult {
    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }

    /// Failed result for an execution that ended without reporting back, e.g. a
    /// panic outside the dispatcher. The path is unknown and left empty.
    pub fn aborted(definition: &WorkflowDefinition, err: AppError) -> Self {
        let mut record = WorkflowExecutionRecord::new(Uuid::new_v4(), definition.content_hash());
        tracing::error!(
            execution_id = %record.execution_id,
            trigger = %definition.trigger,
            error = %err.message,
            "workflow execution lost"
        );
        record.fail(err.message.clone());
        ExecutionResult {
            execution_id: record.execution_id,
            status: ResultStatus::Failed,
            execution_path: Vec::new(),
            tasks: definition.tasks.clone(),
            error: Some(err.message),
            error_code: Some(err.code),
            record,
        }
    }

    pub fn to_value(&self) -> Result<Value, AppError> {
        serde_json::to_value(self).map_err(AppError::from)
    }
}

#[derive(Debug, Clone)]
struct PausedNode {
    node_id: String,
    on_resume: Value,
    attempt: u32,
}

/// Resumable state of one execution.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    tasks: IndexMap<String, TaskNode>,
    context: Arc<Map<String, Value>>,
    record: WorkflowExecutionRecord,
    execution_path: Vec<String>,
    current: Option<String>,
    steps: usize,
    paused: Option<PausedNode>,
    cancel: CancellationToken,
}

impl WorkflowRun {
    pub fn execution_id(&self) -> Uuid {
        self.record.execution_id
    }

    pub fn record(&self) -> &WorkflowExecutionRecord {
        &self.record
    }

    pub fn execution_path(&self) -> &[String] {
        &self.execution_path
    }

    pub fn tasks(&self) -> &IndexMap<String, TaskNode> {
        &self.tasks
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }
}

/// Progress of a run after `start` or `advance`.
#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub enum RunStep {
    Finished(ExecutionResult),
    /// A delay node yielded; pass `run` back to `advance` once `resume_at` is reached.
    Suspended {
        run: WorkflowRun,
        resume_at: Instant,
    },
}

enum Termination {
    Completed,
    TriggerNotSatisfied,
    Failed(DispatchError),
    Fatal(AppError),
}

enum Settled {
    Next(Option<String>),
    Failed(DispatchError),
    Suspended { duration: Duration, on_resume: Value },
}

/// Walks workflow graphs through a [`Dispatcher`], persisting a record snapshot after every transition.
#[derive(Clone)]
pub struct WorkflowExecutor {
    dispatcher: Dispatcher,
    settings: ExecutorSettings,
    sink: Arc<dyn ExecutionSink>,
}

impl WorkflowExecutor {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            settings: ExecutorSettings::default(),
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_settings(mut self, settings: ExecutorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ExecutionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    pub async fn execute_workflow(
        &self,
        definition: Arc<WorkflowDefinition>,
        context: Map<String, Value>,
    ) -> ExecutionResult {
        self.execute_with_cancel(definition, context, CancellationToken::new())
            .await
    }

    /// Run to completion, sleeping through delay suspensions.
    pub async fn execute_with_cancel(
        &self,
        definition: Arc<WorkflowDefinition>,
        context: Map<String, Value>,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let mut step = self.start(definition, context, cancel).await;
        loop {
            match step {
                RunStep::Finished(result) => return result,
                RunStep::Suspended { run, resume_at } => {
                    let cancel = run.cancel.clone();
                    tokio::select! {
                        _ = sleep_until(resume_at) => {}
                        _ = cancel.cancelled() => {}
                    }
                    step = self.advance(run).await;
                }
            }
        }
    }

    /// Resolve and gate on the trigger, then traverse until the run finishes or suspends.
    pub async fn start(
        &self,
        definition: Arc<WorkflowDefinition>,
        context: Map<String, Value>,
        cancel: CancellationToken,
    ) -> RunStep {
        let execution_id = Uuid::new_v4();
        let mut run = WorkflowRun {
            tasks: definition.tasks.clone(),
            context: Arc::new(context),
            record: WorkflowExecutionRecord::new(execution_id, definition.content_hash()),
            execution_path: Vec::new(),
            current: None,
            steps: 0,
            paused: None,
            cancel,
        };
        tracing::info!(
            execution_id = %execution_id,
            trigger = %definition.trigger,
            tasks = run.tasks.len(),
            "workflow execution started"
        );
        self.persist(&run.record).await;

        if let Err(err) = run.record.transition(ExecutionState::InProgress) {
            return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
        }
        self.persist(&run.record).await;

        let trigger_id = definition.trigger.clone();
        if trigger_id.is_empty() || !run.tasks.contains_key(&trigger_id) {
            let err = AppError::new(
                ErrorCategory::MissingTrigger,
                format!("trigger '{}' is not defined in tasks", trigger_id),
            );
            return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
        }

        if self.settings.preflight_validation {
            if let Some(err) = self.preflight(&mut run) {
                return RunStep::Finished(self.finish(run, Termination::Failed(err)).await);
            }
        }

        if run.cancel.is_cancelled() {
            return RunStep::Finished(self.finish(run, Termination::Fatal(cancelled())).await);
        }

        run.steps += 1;
        let outcome = match self.dispatch_node(&mut run, &trigger_id).await {
            Ok((outcome, _)) => outcome,
            Err(err) => return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await),
        };
        let passed = match &outcome {
            DispatchOutcome::Completed { result } => run
                .tasks
                .get(&trigger_id)
                .map(|node| branch_outcome(node, result))
                .unwrap_or(false),
            _ => false,
        };
        let settled = settle(&mut run, &trigger_id, outcome);
        self.persist(&run.record).await;

        match settled {
            Settled::Next(next) if passed => {
                run.execution_path.push(trigger_id);
                run.current = next;
            }
            Settled::Next(_) => {
                tracing::info!(execution_id = %execution_id, trigger = %trigger_id, "trigger not satisfied");
                return RunStep::Finished(self.finish(run, Termination::TriggerNotSatisfied).await);
            }
            Settled::Failed(err) => {
                let termination = if err.kind.is_fatal() {
                    Termination::Fatal(into_app_error(err))
                } else {
                    Termination::Failed(err)
                };
                return RunStep::Finished(self.finish(run, termination).await);
            }
            Settled::Suspended { .. } => {
                let err = AppError::new(
                    ErrorCategory::HandlerFailure,
                    format!("trigger '{}' cannot suspend the execution", trigger_id),
                );
                if let Some(node) = run.tasks.get_mut(&trigger_id) {
                    node.status = NodeStatus::Failed;
                }
                return RunStep::Finished(self.finish(run, Termination::Failed(err.into())).await);
            }
        }

        self.advance(run).await
    }

    /// Continue a run: completes a paused delay node first, then traverses.
    pub async fn advance(&self, mut run: WorkflowRun) -> RunStep {
        if let Some(paused) = run.paused.take() {
            if run.cancel.is_cancelled() {
                return RunStep::Finished(self.finish(run, Termination::Fatal(cancelled())).await);
            }
            if let Err(err) = run.record.transition(ExecutionState::InProgress) {
                return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
            }
            tracing::info!(execution_id = %run.record.execution_id, node_id = %paused.node_id, "execution resumed");
            run.record.record_outcome(NodeOutcomeRecord {
                node_id: paused.node_id.clone(),
                task_type: run
                    .tasks
                    .get(&paused.node_id)
                    .map(|node| node.task_type)
                    .unwrap_or(TaskType::Delay),
                status: NodeStatus::Completed,
                attempt: paused.attempt,
                result: Some(paused.on_resume.clone()),
                error: None,
                recorded_at: Utc::now(),
            });
            let outcome = DispatchOutcome::Completed {
                result: paused.on_resume,
            };
            match settle(&mut run, &paused.node_id, outcome) {
                Settled::Next(next) => run.current = next,
                Settled::Failed(err) => {
                    return RunStep::Finished(self.finish(run, Termination::Failed(err)).await)
                }
                Settled::Suspended { .. } => {
                    let err = AppError::new(
                        ErrorCategory::InternalError,
                        format!("task '{}' suspended again on resume", paused.node_id),
                    );
                    return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
                }
            }
            self.persist(&run.record).await;
        }

        loop {
            let node_id = match run.current.take() {
                Some(node_id) => node_id,
                None => return RunStep::Finished(self.finish(run, Termination::Completed).await),
            };

            if run.cancel.is_cancelled() {
                return RunStep::Finished(self.finish(run, Termination::Fatal(cancelled())).await);
            }
            if !run.tasks.contains_key(&node_id) {
                let err = AppError::new(
                    ErrorCategory::UnknownNodeReference,
                    format!("task '{}' is referenced but not defined", node_id),
                );
                return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
            }
            if run.steps >= self.settings.max_steps {
                let err = AppError::new(
                    ErrorCategory::IterationLimit,
                    format!("workflow exceeded max_steps ({})", self.settings.max_steps),
                );
                return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
            }
            run.steps += 1;
            run.execution_path.push(node_id.clone());

            let (outcome, attempt) = match self.dispatch_node(&mut run, &node_id).await {
                Ok(dispatched) => dispatched,
                Err(err) => {
                    return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await)
                }
            };

            match settle(&mut run, &node_id, outcome) {
                Settled::Next(next) => {
                    self.persist(&run.record).await;
                    run.current = next;
                }
                Settled::Failed(err) => {
                    let termination = if err.kind.is_fatal() {
                        Termination::Fatal(into_app_error(err))
                    } else {
                        Termination::Failed(err)
                    };
                    return RunStep::Finished(self.finish(run, termination).await);
                }
                Settled::Suspended {
                    duration,
                    on_resume,
                } => {
                    let Some(resume_at) = Instant::now().checked_add(duration) else {
                        let err = DispatchError::from(AppError::new(
                            ErrorCategory::InvalidProperties,
                            format!("delay of task '{}' cannot be scheduled", node_id),
                        ));
                        if let Some(node) = run.tasks.get_mut(&node_id) {
                            node.status = NodeStatus::Failed;
                            node.result = Some(err.to_value());
                        }
                        return RunStep::Finished(self.finish(run, Termination::Failed(err)).await);
                    };
                    if let Err(err) = run.record.transition(ExecutionState::Pause) {
                        return RunStep::Finished(self.finish(run, Termination::Fatal(err)).await);
                    }
                    run.paused = Some(PausedNode {
                        node_id: node_id.clone(),
                        on_resume,
                        attempt,
                    });
                    self.persist(&run.record).await;
                    tracing::info!(
                        execution_id = %run.record.execution_id,
                        node_id = %node_id,
                        delay_ms = duration.as_millis() as u64,
                        "execution paused"
                    );
                    return RunStep::Suspended { run, resume_at };
                }
            }
        }
    }

    /// Dispatch with retries. `Err` means the execution must abort.
    async fn dispatch_node(
        &self,
        run: &mut WorkflowRun,
        node_id: &str,
    ) -> Result<(DispatchOutcome, u32), AppError> {
        let node = run.tasks.get(node_id).cloned().ok_or_else(|| {
            AppError::new(
                ErrorCategory::UnknownNodeReference,
                format!("task '{}' is referenced but not defined", node_id),
            )
        })?;
        let ctx = TaskContext::new(run.record.execution_id, node_id, Arc::clone(&run.context));
        let cancel = run.cancel.clone();
        let mut attempt = 1u32;

        loop {
            tracing::debug!(
                execution_id = %ctx.execution_id,
                node_id = %node_id,
                task_type = %node.task_type,
                attempt,
                "dispatching task"
            );
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                outcome = self.dispatcher.execute(&node, &ctx) => outcome,
            };
            run.record
                .record_outcome(outcome_record(&node, &outcome, attempt));

            let retryable = outcome
                .error()
                .map(|err| err.kind.is_retryable())
                .unwrap_or(false);
            if !retryable || run.record.retry_count >= self.settings.retry.max_retries {
                return Ok((outcome, attempt));
            }

            run.record.transition(ExecutionState::Retry)?;
            self.persist(&run.record).await;
            let wait = self.settings.retry.backoff_for(run.record.retry_count);
            tracing::warn!(
                execution_id = %ctx.execution_id,
                node_id = %node_id,
                retry_count = run.record.retry_count,
                backoff_ms = wait.as_millis() as u64,
                error = outcome.error().map(|err| err.message.as_str()).unwrap_or(""),
                "task failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = sleep(wait) => {}
            }
            run.record.transition(ExecutionState::InProgress)?;
            self.persist(&run.record).await;
            attempt += 1;
        }
    }

    /// Reject the definition before any handler runs when a node's properties
    /// or successor references are invalid. Every offending node is marked failed.
    fn preflight(&self, run: &mut WorkflowRun) -> Option<DispatchError> {
        let registry = self.dispatcher.registry();
        let known: HashSet<String> = run.tasks.keys().cloned().collect();
        let mut first: Option<DispatchError> = None;
        let mut rejected = 0usize;

        for (id, node) in run.tasks.iter_mut() {
            let problem = if let Err(err) = TaskProperties::parse(node.task_type, &node.properties)
            {
                Some(DispatchError::from(err))
            } else if !registry.validate(node.task_type, &node.properties) {
                Some(DispatchError::from(AppError::new(
                    ErrorCategory::InvalidProperties,
                    format!("Invalid properties for task type: {}", node.task_type),
                )))
            } else {
                node.next
                    .targets()
                    .into_iter()
                    .find(|target| !known.contains(*target))
                    .map(|missing| {
                        DispatchError::from(AppError::new(
                            ErrorCategory::UnknownNodeReference,
                            format!("task '{}' references undefined task '{}'", id, missing),
                        ))
                    })
            };

            if let Some(problem) = problem {
                tracing::warn!(node_id = %id, code = %problem.code, error = %problem.message, "preflight rejected task");
                node.status = NodeStatus::Failed;
                node.result = Some(problem.to_value());
                rejected += 1;
                first.get_or_insert(problem);
            }
        }

        first.map(|first| DispatchError {
            kind: first.kind,
            code: first.code,
            message: format!(
                "workflow definition rejected: {} task(s) invalid; first: {}",
                rejected, first.message
            ),
        })
    }

    async fn finish(&self, mut run: WorkflowRun, termination: Termination) -> ExecutionResult {
        let (status, error, error_code) = match termination {
            Termination::Completed => match run.record.transition(ExecutionState::Complete) {
                Ok(()) => (ResultStatus::Completed, None, None),
                Err(err) => {
                    run.record.fail(err.message.clone());
                    (ResultStatus::Failed, Some(err.message), Some(err.code))
                }
            },
            Termination::TriggerNotSatisfied => {
                run.record.fail(TRIGGER_NOT_SATISFIED);
                (
                    ResultStatus::Failed,
                    Some(TRIGGER_NOT_SATISFIED.to_string()),
                    None,
                )
            }
            Termination::Failed(err) => {
                run.record.fail(err.message.clone());
                (ResultStatus::Failed, Some(err.message), Some(err.code))
            }
            Termination::Fatal(err) => {
                tracing::error!(
                    execution_id = %run.record.execution_id,
                    code = %err.code,
                    error = %err.message,
                    "workflow execution aborted"
                );
                run.record.fail(err.message.clone());
                (ResultStatus::Failed, Some(err.message), Some(err.code))
            }
        };
        self.persist(&run.record).await;
        tracing::info!(
            execution_id = %run.record.execution_id,
            status = status.as_str(),
            state = %run.record.state,
            path_len = run.execution_path.len(),
            retry_count = run.record.retry_count,
            "workflow execution finished"
        );

        ExecutionResult {
            execution_id: run.record.execution_id,
            status,
            execution_path: run.execution_path,
            tasks: run.tasks,
            error,
            error_code,
            record: run.record,
        }
    }

    async fn persist(&self, record: &WorkflowExecutionRecord) {
        if let Err(err) = self.sink.persist(record).await {
            tracing::warn!(
                execution_id = %record.execution_id,
                state = %record.state,
                error = %err,
                "failed to persist execution record"
            );
        }
    }
}

/// Apply a dispatch outcome to its node and pick the successor.
fn settle(run: &mut WorkflowRun, node_id: &str, outcome: DispatchOutcome) -> Settled {
    let Some(node) = run.tasks.get_mut(node_id) else {
        return Settled::Failed(DispatchError::from(AppError::new(
            ErrorCategory::UnknownNodeReference,
            format!("task '{}' is referenced but not defined", node_id),
        )));
    };
    node.status = outcome.status();
    match outcome {
        DispatchOutcome::Completed { result } => {
            let next = node
                .next
                .select(branch_outcome(node, &result))
                .map(String::from);
            node.result = Some(result);
            Settled::Next(next)
        }
        DispatchOutcome::Failed { error } => {
            node.result = Some(error.to_value());
            Settled::Failed(error)
        }
        DispatchOutcome::Suspended {
            duration,
            on_resume,
        } => {
            node.result = None;
            Settled::Suspended {
                duration,
                on_resume,
            }
        }
    }
}

/// Condition nodes branch on their boolean result; every other completed node is `true`.
fn branch_outcome(node: &TaskNode, result: &Value) -> bool {
    match node.task_type {
        TaskType::Condition => result
            .get("result")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        _ => true,
    }
}

fn outcome_record(node: &TaskNode, outcome: &DispatchOutcome, attempt: u32) -> NodeOutcomeRecord {
    let (result, error) = match outcome {
        DispatchOutcome::Completed { result } => (Some(result.clone()), None),
        DispatchOutcome::Failed { error } => (None, Some(error.clone())),
        DispatchOutcome::Suspended { .. } => (None, None),
    };
    NodeOutcomeRecord {
        node_id: node.id.clone(),
        task_type: node.task_type,
        status: outcome.status(),
        attempt,
        result,
        error,
        recorded_at: Utc::now(),
    }
}

fn cancelled() -> AppError {
    AppError::new(ErrorCategory::Cancelled, "execution cancelled").with_code(codes::CANCELLED)
}

fn into_app_error(err: DispatchError) -> AppError {
    AppError::new(err.kind, err.message).with_code(err.code)
}
