use crate::cli::Command;
use std::env;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A person running one workflow or validating a definition.
    Interactive,
    /// Event fan-out across many definitions.
    Batch,
    /// Long-lived consumer supervised by another process (`HEPHESTOS_WORKER=1`).
    Worker,
}

impl ExecutionContext {
    /// Returns `true` when console sinks are off unless configured.
    pub fn quiet_by_default(self) -> bool {
        matches!(self, ExecutionContext::Batch)
    }
}

/// Derive the active execution context from a parsed CLI command plus overrides.
pub fn detect_context(command: &Command) -> ExecutionContext {
    if worker_override_enabled() {
        return ExecutionContext::Worker;
    }

    match command {
        Command::Process(_) => ExecutionContext::Batch,
        Command::Run(_) | Command::Validate(_) => ExecutionContext::Interactive,
    }
}

fn worker_override_enabled() -> bool {
    env::var("HEPHESTOS_WORKER")
        .map(|value| value.trim() == "1")
        .unwrap_or(false)
}
