//! Workflow graph execution support for Hephestos automations.

pub mod condition;
pub mod dispatcher;
pub mod executor;
pub mod handlers;
pub mod lint;
pub mod processor;
pub mod properties;
pub mod registry;
pub mod schema;
pub mod sink;
pub mod state;
