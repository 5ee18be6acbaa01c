#![allow(clippy::result_large_err)] // Property parsing returns AppError so validators and handlers share one diagnostic shape.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow_graph::condition::Condition;
use crate::core::workflow_graph::schema::TaskType;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpProperties {
    pub url: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
}

impl DelayUnit {
    fn seconds(&self) -> f64 {
        match self {
            DelayUnit::Seconds => 1.0,
            DelayUnit::Minutes => 60.0,
            DelayUnit::Hours => 3600.0,
        }
    }
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelayUnit::Seconds => f.write_str("seconds"),
            DelayUnit::Minutes => f.write_str("minutes"),
            DelayUnit::Hours => f.write_str("hours"),
        }
    }
}

/// Longest delay a node may request.
pub const MAX_DELAY: Duration = Duration::from_secs(366 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayProperties {
    pub duration: f64,
    pub unit: DelayUnit,
}

impl DelayProperties {
    /// Wall-clock length of the delay, bounded by [`MAX_DELAY`].
    pub fn as_duration(&self) -> Result<Duration, AppError> {
        let duration = Duration::try_from_secs_f64(self.duration * self.unit.seconds())
            .map_err(|err| invalid(TaskType::Delay, format!("duration: {}", err)))?;
        if duration > MAX_DELAY {
            return Err(invalid(
                TaskType::Delay,
                format!(
                    "duration must not exceed {}",
                    humantime::format_duration(MAX_DELAY)
                ),
            ));
        }
        Ok(duration)
    }

    /// Human form reported back as `delayed_for`, e.g. `5 seconds`.
    pub fn describe(&self) -> String {
        if self.duration.fract() == 0.0 && self.duration.abs() < 1e15 {
            format!("{} {}", self.duration as i64, self.unit)
        } else {
            format!("{} {}", self.duration, self.unit)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionProperties {
    pub condition_type: String,
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Typed view of a node's property bag, one variant per built-in task type.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskProperties {
    Http(HttpProperties),
    Delay(DelayProperties),
    Condition(ConditionProperties),
    /// Types without a built-in schema keep their raw mapping.
    Opaque(Map<String, Value>),
}

impl TaskProperties {
    pub fn parse(task_type: TaskType, properties: &Value) -> Result<Self, AppError> {
        match task_type {
            TaskType::Http => {
                let parsed: HttpProperties = decode(task_type, properties)?;
                check_http(&parsed)?;
                Ok(TaskProperties::Http(parsed))
            }
            TaskType::Delay => {
                let parsed: DelayProperties = decode(task_type, properties)?;
                check_delay(&parsed)?;
                Ok(TaskProperties::Delay(parsed))
            }
            TaskType::Condition => {
                let parsed: ConditionProperties = decode(task_type, properties)?;
                if parsed.conditions.is_empty() {
                    return Err(invalid(task_type, "conditions must be a non-empty list"));
                }
                Ok(TaskProperties::Condition(parsed))
            }
            _ => match properties {
                Value::Object(map) => Ok(TaskProperties::Opaque(map.clone())),
                Value::Null => Ok(TaskProperties::Opaque(Map::new())),
                _ => Err(invalid(task_type, "properties must be an object")),
            },
        }
    }
}

fn decode<T: DeserializeOwned>(task_type: TaskType, properties: &Value) -> Result<T, AppError> {
    serde_json::from_value(properties.clone()).map_err(|err| invalid(task_type, err.to_string()))
}

fn invalid(task_type: TaskType, detail: impl fmt::Display) -> AppError {
    AppError::new(
        ErrorCategory::InvalidProperties,
        format!("Invalid properties for task type {}: {}", task_type, detail),
    )
}

fn check_http(properties: &HttpProperties) -> Result<(), AppError> {
    let parsed = Url::parse(&properties.url)
        .map_err(|err| invalid(TaskType::Http, format!("url: {}", err)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(TaskType::Http, "url must use http or https"));
    }
    Ok(())
}

fn check_delay(properties: &DelayProperties) -> Result<(), AppError> {
    if !properties.duration.is_finite() || properties.duration <= 0.0 {
        return Err(invalid(TaskType::Delay, "duration must be a number > 0"));
    }
    properties.as_duration().map(|_| ())
}

pub fn validate_http_properties(properties: &Value) -> bool {
    TaskProperties::parse(TaskType::Http, properties).is_ok()
}

pub fn validate_delay_properties(properties: &Value) -> bool {
    TaskProperties::parse(TaskType::Delay, properties).is_ok()
}

pub fn validate_condition_properties(properties: &Value) -> bool {
    TaskProperties::parse(TaskType::Condition, properties).is_ok()
}
