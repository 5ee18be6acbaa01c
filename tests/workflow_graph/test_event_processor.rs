use async_trait::async_trait;
use hephestos::core::config::EngineConfig;
use hephestos::core::error::AppError;
use hephestos::core::workflow_graph::{
    dispatcher::Dispatcher,
    executor::{ResultStatus, WorkflowExecutor},
    handlers::register_builtins,
    processor::{DirectoryDefinitionStore, EventProcessor, InMemoryDefinitionStore, WorkflowEvent},
    registry::{HandlerOutput, TaskContext, TaskHandler, TaskRegistry},
    schema::{TaskNode, TaskType, WorkflowDefinition},
    sink::ExecutionSink,
    state::WorkflowExecutionRecord,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Tracks how many invocations overlap.
struct GaugeHandler {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl TaskHandler for GaugeHandler {
    async fn execute(&self, _properties: &Value, _ctx: &TaskContext) -> Result<HandlerOutput, AppError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(HandlerOutput::Completed(json!({"ok": true})))
    }
}

/// Panics while persisting snapshots of one definition, outside any handler.
struct PanickingSink {
    workflow_hash: String,
}

#[async_trait]
impl ExecutionSink for PanickingSink {
    async fn persist(&self, record: &WorkflowExecutionRecord) -> Result<(), AppError> {
        if record.workflow_hash == self.workflow_hash {
            panic!("sink exploded");
        }
        Ok(())
    }
}

fn topic_trigger(topic: &str) -> TaskNode {
    TaskNode::new(
        "t0",
        TaskType::Condition,
        json!({
            "condition_type": "if",
            "conditions": [{"field": "topic", "value": topic}]
        }),
    )
}

fn builtin_executor() -> WorkflowExecutor {
    let mut builder = TaskRegistry::builder();
    register_builtins(&mut builder, &EngineConfig::default()).expect("builtins");
    WorkflowExecutor::new(Dispatcher::new(builder.build()))
}

fn event(shop: &str, topic: &str) -> WorkflowEvent {
    let mut context = Map::new();
    context.insert("topic".to_string(), json!(topic));
    WorkflowEvent::new(shop, context)
}

#[tokio::test]
async fn every_definition_of_the_shop_runs_in_store_order() {
    let store = Arc::new(InMemoryDefinitionStore::new());
    store.insert("acme", WorkflowDefinition::new("t0").with_task(topic_trigger("orders/paid")));
    store.insert(
        "acme",
        WorkflowDefinition::new("t0").with_task(topic_trigger("orders/cancelled")),
    );
    store.insert("other", WorkflowDefinition::new("t0").with_task(topic_trigger("orders/paid")));

    let processor = EventProcessor::new(builtin_executor(), store, 4);
    let results = processor
        .process(event("acme", "orders/paid"))
        .await
        .expect("process");

    let statuses: Vec<ResultStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(statuses, vec![ResultStatus::Completed, ResultStatus::Failed]);
    assert_eq!(results[0].execution_path, vec!["t0"]);
    assert!(results[1].execution_path.is_empty());
    assert_ne!(results[0].execution_id, results[1].execution_id);
}

#[tokio::test]
async fn unknown_shop_yields_no_results() {
    let store = Arc::new(InMemoryDefinitionStore::new());
    let processor = EventProcessor::new(builtin_executor(), store, 4);
    let results = processor
        .process(event("nobody", "orders/paid"))
        .await
        .expect("process");
    assert!(results.is_empty());
}

#[tokio::test]
async fn concurrency_is_bounded_by_the_limit() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut builder = TaskRegistry::builder();
    register_builtins(&mut builder, &EngineConfig::default()).expect("builtins");
    builder
        .register(
            TaskType::Action,
            GaugeHandler {
                active: Arc::clone(&active),
                peak: Arc::clone(&peak),
            },
            None,
        )
        .expect("register");
    let executor = WorkflowExecutor::new(Dispatcher::new(builder.build()));

    let store = Arc::new(InMemoryDefinitionStore::new());
    for _ in 0..6 {
        store.insert(
            "acme",
            WorkflowDefinition::new("t0")
                .with_task(topic_trigger("orders/paid").with_next(["work"]))
                .with_task(TaskNode::new("work", TaskType::Action, json!({}))),
        );
    }

    let processor = EventProcessor::new(executor, store, 2);
    let results = processor
        .process(event("acme", "orders/paid"))
        .await
        .expect("process");
    assert_eq!(results.len(), 6);
    assert!(results.iter().all(|r| r.is_completed()));
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_crashed_execution_does_not_discard_its_siblings() {
    let healthy = WorkflowDefinition::new("t0").with_task(topic_trigger("orders/paid"));
    let doomed = WorkflowDefinition::new("t0")
        .with_task(topic_trigger("orders/paid").with_next(["after"]))
        .with_task(TaskNode::new(
            "after",
            TaskType::Condition,
            json!({"condition_type": "if", "conditions": [{"field": "topic", "value": "x"}]}),
        ));
    let store = Arc::new(InMemoryDefinitionStore::new());
    store.insert("acme", healthy.clone());
    store.insert("acme", doomed.clone());
    store.insert("acme", healthy);

    let executor = builtin_executor().with_sink(Arc::new(PanickingSink {
        workflow_hash: doomed.content_hash(),
    }));
    let processor = EventProcessor::new(executor, store, 4);
    let results = processor
        .process(event("acme", "orders/paid"))
        .await
        .expect("process");

    assert_eq!(results.len(), 3);
    assert!(results[0].is_completed());
    assert!(results[2].is_completed());
    assert_eq!(results[1].status, ResultStatus::Failed);
    assert!(results[1].execution_path.is_empty());
    assert_eq!(results[1].error_code.as_deref(), Some("WFE-INT-001"));
    assert!(results[1]
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("workflow execution task failed"));
    assert_eq!(results[1].tasks.len(), 2);
}

#[tokio::test]
async fn shutdown_cancels_runs_in_flight() {
    let store = Arc::new(InMemoryDefinitionStore::new());
    store.insert(
        "acme",
        WorkflowDefinition::new("t0")
            .with_task(topic_trigger("orders/paid").with_next(["wait"]))
            .with_task(TaskNode::new(
                "wait",
                TaskType::Delay,
                json!({"duration": 1, "unit": "hours"}),
            )),
    );
    let processor = EventProcessor::new(builtin_executor(), store, 4);
    let shutdown = processor.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
    });

    let results = tokio::time::timeout(
        Duration::from_secs(10),
        processor.process(event("acme", "orders/paid")),
    )
    .await
    .expect("processing should stop after shutdown")
    .expect("process");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, ResultStatus::Failed);
    assert_eq!(results[0].execution_path, vec!["t0", "wait"]);
    assert_eq!(results[0].error_code.as_deref(), Some("WFE-CANCEL-001"));
}

#[tokio::test]
async fn directory_store_feeds_the_processor() {
    let dir = TempDir::new().expect("temp dir");
    let shop_dir = dir.path().join("acme");
    fs::create_dir_all(&shop_dir).expect("mkdir");
    let definition = WorkflowDefinition::new("t0").with_task(topic_trigger("orders/paid"));
    fs::write(
        shop_dir.join("paid.json"),
        serde_json::to_string_pretty(&definition).unwrap(),
    )
    .expect("write definition");

    let store = Arc::new(DirectoryDefinitionStore::new(dir.path()));
    let processor = EventProcessor::new(builtin_executor(), store, 1);
    let results = processor
        .process(event("acme", "orders/paid"))
        .await
        .expect("process");
    assert_eq!(results.len(), 1);
    assert!(results[0].is_completed());

    let err = processor
        .process(event("../acme", "orders/paid"))
        .await
        .unwrap_err();
    assert!(err.message.contains("invalid shop identifier"));
}
