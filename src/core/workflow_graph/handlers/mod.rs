#![allow(clippy::result_large_err)] // Bootstrap surfaces DuplicateRegistration as AppError unchanged.

pub mod condition;
pub mod delay;
pub mod http;

use crate::core::config::EngineConfig;
use crate::core::error::AppError;
use crate::core::workflow_graph::properties::{
    validate_condition_properties, validate_delay_properties, validate_http_properties,
};
use crate::core::workflow_graph::registry::{TaskEntry, TaskRegistryBuilder};
use crate::core::workflow_graph::schema::TaskType;

#[derive(Default)]
pub struct BuiltinHandlerDeps {
    /// Client for the http handler. Built from `EngineConfig::http_timeout` when None.
    pub http_client: Option<reqwest::Client>,
}

/// Register the built-in `http`, `delay` and `condition` task types.
pub fn register_builtins(
    builder: &mut TaskRegistryBuilder,
    config: &EngineConfig,
) -> Result<(), AppError> {
    register_builtins_with_deps(builder, config, BuiltinHandlerDeps::default())
}

pub fn register_builtins_with_deps(
    builder: &mut TaskRegistryBuilder,
    config: &EngineConfig,
    deps: BuiltinHandlerDeps,
) -> Result<(), AppError> {
    let http_handler = match deps.http_client {
        Some(client) => http::HttpTaskHandler::with_client(client),
        None => http::HttpTaskHandler::new(config.http_timeout)?,
    };
    builder
        .register_entry(
            TaskEntry::new(TaskType::Http, http_handler).with_validator(validate_http_properties),
        )?
        .register_entry(
            TaskEntry::new(TaskType::Delay, delay::DelayTaskHandler::new())
                .with_validator(validate_delay_properties),
        )?
        .register_entry(
            TaskEntry::new(TaskType::Condition, condition::ConditionTaskHandler::new())
                .with_validator(validate_condition_properties),
        )?;
    Ok(())
}
