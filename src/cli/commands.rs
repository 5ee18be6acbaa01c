use crate::{
    cli::args::{ProcessArgs, RunArgs, ValidateArgs},
    core::{
        config::{ConfigLoader, EngineConfig},
        workflow_graph::{
            dispatcher::Dispatcher,
            executor::{ExecutorSettings, WorkflowExecutor},
            handlers::register_builtins,
            lint::{has_errors, LintRegistry},
            processor::{DirectoryDefinitionStore, EventProcessor, WorkflowEvent},
            registry::TaskRegistry,
            schema::WorkflowDefinition,
            sink::{ExecutionSink, JsonFileSink, NoopSink},
        },
    },
    Result,
};
use anyhow::{anyhow, Context};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Handles `hephestos run`.
pub async fn run(args: RunArgs) -> Result<i32> {
    let workspace = workspace_or_cwd(args.workspace.as_deref())?;
    let config = load_engine_config(args.config.as_deref(), &workspace)?;
    let definition = WorkflowDefinition::load_from_file(&args.workflow)?;
    let context = match &args.context {
        Some(path) => read_context(path)?,
        None => Map::new(),
    };

    let executor = build_executor(&config)?;
    let cancel = cancel_on_ctrl_c();
    let result = executor
        .execute_with_cancel(Arc::new(definition), context, cancel)
        .await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.is_completed() { 0 } else { 1 })
}

/// Handles `hephestos validate`.
pub async fn validate(args: ValidateArgs) -> Result<i32> {
    let definition = WorkflowDefinition::load_from_file(&args.workflow)?;
    let registry = builtin_registry(&EngineConfig::default())?;
    let results = LintRegistry::new(registry).run(&definition);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("{}: no issues found", args.workflow.display());
    } else {
        for result in &results {
            let location = result
                .location
                .as_deref()
                .map(|location| format!(" [{}]", location))
                .unwrap_or_default();
            println!(
                "{} {}{}: {}",
                result.severity, result.code, location, result.message
            );
            if let Some(suggestion) = &result.suggestion {
                println!("    hint: {}", suggestion);
            }
        }
    }

    Ok(if has_errors(&results) { 1 } else { 0 })
}

/// Handles `hephestos process`.
pub async fn process(args: ProcessArgs) -> Result<i32> {
    let workspace = workspace_or_cwd(args.workspace.as_deref())?;
    let config = load_engine_config(args.config.as_deref(), &workspace)?;
    let context = read_context(&args.event)?;

    let executor = build_executor(&config)?;
    let store = Arc::new(DirectoryDefinitionStore::new(&args.definitions));
    let processor = EventProcessor::new(executor, store, config.max_concurrent_executions);

    let shutdown = processor.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.cancel();
        }
    });

    let results = processor
        .process(WorkflowEvent::new(args.shop, context))
        .await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(0)
}

fn workspace_or_cwd(workspace: Option<&Path>) -> Result<PathBuf> {
    match workspace {
        Some(path) => Ok(path.to_path_buf()),
        None => env::current_dir().context("failed to resolve current directory"),
    }
}

fn load_engine_config(config: Option<&Path>, workspace: &Path) -> Result<EngineConfig> {
    let loaded = match config {
        Some(path) => {
            if !path.exists() {
                return Err(anyhow!("config file {} does not exist", path.display()));
            }
            ConfigLoader::load(path)?
        }
        None => ConfigLoader::load_from_workspace(workspace)?,
    };
    Ok(loaded.engine)
}

fn builtin_registry(config: &EngineConfig) -> Result<TaskRegistry> {
    let mut builder = TaskRegistry::builder();
    register_builtins(&mut builder, config)?;
    Ok(builder.build())
}

fn build_executor(config: &EngineConfig) -> Result<WorkflowExecutor> {
    let registry = builtin_registry(config)?;
    let dispatcher = Dispatcher::new(registry).with_handler_timeout(config.handler_timeout);
    let sink: Arc<dyn ExecutionSink> = match &config.state_dir {
        Some(dir) => Arc::new(JsonFileSink::new(dir)),
        None => Arc::new(NoopSink),
    };
    Ok(WorkflowExecutor::new(dispatcher)
        .with_settings(ExecutorSettings::from_config(config))
        .with_sink(sink))
}

fn read_context(path: &Path) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read context {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse context {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(anyhow!(
            "context {} must be a JSON object",
            path.display()
        )),
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling execution");
            trigger.cancel();
        }
    });
    token
}
