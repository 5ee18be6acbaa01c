use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// A registered validator rejected a node's properties.
    InvalidProperties,
    UnknownTaskType,
    UnknownConditionType,
    UnsupportedOperator,
    /// The definition's trigger id is empty or not present in its tasks.
    MissingTrigger,
    UnknownNodeReference,
    /// The task's own logic failed (non-2xx response, bad input at run time).
    HandlerFailure,
    DuplicateRegistration,
    Cancelled,
    IterationLimit,
    ValidationError,
    SerializationError,
    IoError,
    InternalError,
}

impl ErrorCategory {
    /// Categories that abort the whole execution instead of failing one branch.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorCategory::MissingTrigger
                | ErrorCategory::UnknownNodeReference
                | ErrorCategory::IterationLimit
                | ErrorCategory::Cancelled
                | ErrorCategory::InternalError
        )
    }

    /// Categories a retry policy may act on.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::HandlerFailure)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Fatal,
    Error,
    Warning,
}
