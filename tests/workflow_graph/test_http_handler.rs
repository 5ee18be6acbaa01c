use hephestos::core::config::EngineConfig;
use hephestos::core::error::codes;
use hephestos::core::types::ErrorCategory;
use hephestos::core::workflow_graph::{
    dispatcher::{DispatchOutcome, Dispatcher},
    executor::{ResultStatus, WorkflowExecutor},
    handlers::{http::HttpTaskHandler, register_builtins},
    registry::{HandlerOutput, TaskContext, TaskHandler, TaskRegistry},
    schema::{TaskNode, TaskType, WorkflowDefinition},
};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ctx() -> TaskContext {
    TaskContext::new(Uuid::new_v4(), "notify", Arc::new(Map::new()))
}

#[tokio::test]
async fn posts_json_body_and_returns_parsed_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/order"))
        .and(header("x-shop", "acme"))
        .and(body_json(json!({"order_id": 42})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"accepted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let handler = HttpTaskHandler::new(Duration::from_secs(5)).expect("client");
    let properties = json!({
        "url": format!("{}/hooks/order", server.uri()),
        "method": "POST",
        "headers": {"x-shop": "acme"},
        "body": {"order_id": 42}
    });
    let output = handler.execute(&properties, &ctx()).await.expect("request");
    assert_eq!(
        output,
        HandlerOutput::Completed(json!({"status_code": 201, "data": {"accepted": true}}))
    );
}

#[tokio::test]
async fn plain_text_and_empty_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/empty"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let handler = HttpTaskHandler::new(Duration::from_secs(5)).expect("client");
    let output = handler
        .execute(
            &json!({"url": format!("{}/text", server.uri()), "method": "GET"}),
            &ctx(),
        )
        .await
        .expect("text request");
    assert_eq!(
        output,
        HandlerOutput::Completed(json!({"status_code": 200, "data": "pong"}))
    );

    let output = handler
        .execute(
            &json!({"url": format!("{}/empty", server.uri()), "method": "DELETE"}),
            &ctx(),
        )
        .await
        .expect("empty request");
    assert_eq!(
        output,
        HandlerOutput::Completed(json!({"status_code": 204, "data": null}))
    );
}

#[tokio::test]
async fn non_success_status_is_a_handler_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/inventory"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let handler = HttpTaskHandler::new(Duration::from_secs(5)).expect("client");
    let err = handler
        .execute(
            &json!({"url": format!("{}/inventory", server.uri()), "method": "PUT", "body": "sku=1"}),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::HandlerFailure);
    assert_eq!(err.code, codes::HANDLER_FAILURE);
    assert_eq!(err.context.get("status_code").map(String::as_str), Some("502"));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let handler = HttpTaskHandler::new(Duration::from_millis(100)).expect("client");
    let err = handler
        .execute(
            &json!({"url": format!("{}/slow", server.uri()), "method": "GET"}),
            &ctx(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::HandlerFailure);
    assert_eq!(err.code, codes::HANDLER_TIMEOUT);
}

#[tokio::test]
async fn http_node_inside_a_workflow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut builder = TaskRegistry::builder();
    register_builtins(&mut builder, &EngineConfig::default()).expect("builtins");
    let executor = WorkflowExecutor::new(Dispatcher::new(builder.build()));
    let definition = WorkflowDefinition::new("paid")
        .with_task(
            TaskNode::new(
                "paid",
                TaskType::Condition,
                json!({
                    "condition_type": "if",
                    "conditions": [{"field": "financial_status", "value": "paid"}]
                }),
            )
            .with_next(["notify"]),
        )
        .with_task(TaskNode::new(
            "notify",
            TaskType::Http,
            json!({"url": format!("{}/notify", server.uri()), "method": "POST", "body": {"n": 1}}),
        ));
    let mut context = Map::new();
    context.insert("financial_status".to_string(), json!("paid"));

    let result = executor
        .execute_workflow(Arc::new(definition), context)
        .await;
    assert_eq!(result.status, ResultStatus::Completed);
    assert_eq!(result.execution_path, vec!["paid", "notify"]);
    assert_eq!(
        result.tasks["notify"].result,
        Some(json!({"status_code": 200, "data": {"ok": true}}))
    );
}

#[tokio::test]
async fn invalid_properties_are_rejected_by_dispatch() {
    let mut builder = TaskRegistry::builder();
    register_builtins(&mut builder, &EngineConfig::default()).expect("builtins");
    let dispatcher = Dispatcher::new(builder.build());
    let node = TaskNode::new(
        "notify",
        TaskType::Http,
        json!({"url": "https://example.com", "method": "PATCH"}),
    );
    let outcome = dispatcher.execute(&node, &ctx()).await;
    match outcome {
        DispatchOutcome::Failed { error } => {
            assert_eq!(error.kind, ErrorCategory::InvalidProperties)
        }
        other => panic!("expected failure, got {:?}", other),
    }
}
