#![allow(clippy::result_large_err)]

use crate::core::error::{codes, AppError};
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::properties::{HttpProperties, TaskProperties};
use crate::core::workflow_graph::registry::{HandlerOutput, TaskContext, TaskHandler};
use crate::core::workflow_graph::schema::TaskType;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Performs one outbound request per visit and reports `{status_code, data}`.
pub struct HttpTaskHandler {
    client: reqwest::Client,
}

impl HttpTaskHandler {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("failed to build http client: {}", e),
                )
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, props: &HttpProperties, ctx: &TaskContext) -> Result<Value, AppError> {
        let mut request = self.client.request(props.method.as_reqwest(), &props.url);
        for (name, value) in &props.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request = match &props.body {
            None | Some(Value::Null) => request,
            Some(Value::String(text)) => request.body(text.clone()),
            Some(body) => request.json(body),
        };

        tracing::debug!(
            execution_id = %ctx.execution_id,
            node_id = %ctx.node_id,
            method = ?props.method,
            url = %props.url,
            "sending http request"
        );

        let response = request.send().await.map_err(|e| request_error(&props.url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| request_error(&props.url, e))?;

        if !status.is_success() {
            let mut err = AppError::new(
                ErrorCategory::HandlerFailure,
                format!("{} returned HTTP {}", props.url, status.as_u16()),
            );
            err.add_context("status_code", &status.as_u16().to_string());
            return Err(err);
        }

        let data = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(json!({
            "status_code": status.as_u16(),
            "data": data,
        }))
    }
}

fn request_error(url: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::new(
            ErrorCategory::HandlerFailure,
            format!("request to {} timed out", url),
        )
        .with_code(codes::HANDLER_TIMEOUT)
    } else {
        AppError::new(
            ErrorCategory::HandlerFailure,
            format!("request to {} failed: {}", url, err),
        )
    }
}

#[async_trait]
impl TaskHandler for HttpTaskHandler {
    async fn execute(
        &self,
        properties: &Value,
        ctx: &TaskContext,
    ) -> Result<HandlerOutput, AppError> {
        let props = match TaskProperties::parse(TaskType::Http, properties)? {
            TaskProperties::Http(props) => props,
            _ => {
                return Err(AppError::new(
                    ErrorCategory::InvalidProperties,
                    "Invalid properties for task type: http",
                ))
            }
        };
        self.send(&props, ctx).await.map(HandlerOutput::Completed)
    }
}
