use crate::core::workflow_graph::registry::TaskRegistry;
use crate::core::workflow_graph::schema::WorkflowDefinition;
use serde::Serialize;
use std::fmt;

pub mod rules;
pub use rules::*;

/// Diagnostic severity levels emitted by workflow lint rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    Error,
    Warning,
    Info,
}

impl LintSeverity {
    fn rank(&self) -> u8 {
        match self {
            LintSeverity::Error => 3,
            LintSeverity::Warning => 2,
            LintSeverity::Info => 1,
        }
    }
}

impl fmt::Display for LintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LintSeverity::Error => write!(f, "Error"),
            LintSeverity::Warning => write!(f, "Warning"),
            LintSeverity::Info => write!(f, "Info"),
        }
    }
}

/// Individual lint/validation result emitted by a rule.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub code: String,
    pub severity: LintSeverity,
    pub message: String,
    pub location: Option<String>,
    pub suggestion: Option<String>,
}

impl LintResult {
    pub fn new(
        code: impl Into<String>,
        severity: LintSeverity,
        message: impl Into<String>,
        location: Option<String>,
        suggestion: Option<String>,
    ) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            location,
            suggestion,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == LintSeverity::Error
    }
}

/// Trait implemented by workflow lint rules.
pub trait WorkflowLintRule: Send + Sync {
    fn validate(&self, workflow: &WorkflowDefinition, registry: &TaskRegistry) -> Vec<LintResult>;
}

/// Runs every built-in rule against a definition.
pub struct LintRegistry {
    registry: TaskRegistry,
    rules: Vec<Box<dyn WorkflowLintRule>>,
}

impl LintRegistry {
    /// `registry` decides which task types have handlers and validators.
    pub fn new(registry: TaskRegistry) -> Self {
        Self {
            registry,
            rules: built_in_rules(),
        }
    }

    /// Results are sorted by `(severity desc, code asc, location asc)`.
    pub fn run(&self, workflow: &WorkflowDefinition) -> Vec<LintResult> {
        let mut results = Vec::new();
        for rule in &self.rules {
            results.extend(rule.validate(workflow, &self.registry));
        }
        results.sort_by(|a, b| {
            let severity_cmp = b.severity.rank().cmp(&a.severity.rank());
            severity_cmp
                .then(a.code.cmp(&b.code))
                .then(a.location.cmp(&b.location))
        });
        results
    }
}

pub fn has_errors(results: &[LintResult]) -> bool {
    results.iter().any(LintResult::is_error)
}
