use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Stable error codes surfaced in execution results and persisted records.
pub mod codes {
    pub const INVALID_PROPERTIES: &str = "WFE-PROP-001";
    pub const UNKNOWN_TASK_TYPE: &str = "WFE-TYPE-001";
    pub const UNKNOWN_CONDITION_TYPE: &str = "WFE-COND-001";
    pub const UNSUPPORTED_OPERATOR: &str = "WFE-COND-002";
    pub const MISSING_TRIGGER: &str = "WFE-GRAPH-001";
    pub const UNKNOWN_NODE_REFERENCE: &str = "WFE-GRAPH-002";
    pub const HANDLER_FAILURE: &str = "WFE-EXEC-001";
    pub const DUPLICATE_REGISTRATION: &str = "WFE-REG-001";
    pub const HANDLER_TIMEOUT: &str = "WFE-TIME-001";
    pub const CANCELLED: &str = "WFE-CANCEL-001";
    pub const STEP_LIMIT: &str = "WFE-ITER-001";
}

#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub context: HashMap<String, String>,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        let severity = if category.is_fatal() || category == ErrorCategory::DuplicateRegistration
        {
            ErrorSeverity::Fatal
        } else {
            ErrorSeverity::Error
        };
        AppError {
            category,
            severity,
            code: default_code(category).to_string(),
            message: message.into(),
            context: HashMap::new(),
            occurred_at: Utc::now(),
            source: None,
        }
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        let mut error = AppError::new(category, message);
        error.source = Some(anyhow::anyhow!(source));
        error
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context.insert("context".to_string(), context.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.to_string(), value.to_string());
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }
}

fn default_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::InvalidProperties => codes::INVALID_PROPERTIES,
        ErrorCategory::UnknownTaskType => codes::UNKNOWN_TASK_TYPE,
        ErrorCategory::UnknownConditionType => codes::UNKNOWN_CONDITION_TYPE,
        ErrorCategory::UnsupportedOperator => codes::UNSUPPORTED_OPERATOR,
        ErrorCategory::MissingTrigger => codes::MISSING_TRIGGER,
        ErrorCategory::UnknownNodeReference => codes::UNKNOWN_NODE_REFERENCE,
        ErrorCategory::HandlerFailure => codes::HANDLER_FAILURE,
        ErrorCategory::DuplicateRegistration => codes::DUPLICATE_REGISTRATION,
        ErrorCategory::Cancelled => codes::CANCELLED,
        ErrorCategory::IterationLimit => codes::STEP_LIMIT,
        ErrorCategory::ValidationError => "WFE-CONF-001",
        ErrorCategory::SerializationError => "WFE-SER-001",
        ErrorCategory::IoError => "WFE-IO-001",
        ErrorCategory::InternalError => "WFE-INT-001",
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if !self.context.is_empty() {
            write!(f, " (Context: {:?})", self.context)?;
        }
        if let Some(ref source) = self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        let mut error = AppError::new(ErrorCategory::InternalError, e.to_string());
        error.source = Some(e);
        error
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        let mut error = AppError::new(ErrorCategory::IoError, e.to_string());
        error.source = Some(anyhow::anyhow!(e));
        error
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        let mut error = AppError::new(ErrorCategory::SerializationError, e.to_string());
        error.source = Some(anyhow::anyhow!(e));
        error
    }
}
