pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration loaded from `engine.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HephestosConfig {
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Request timeout applied by the http task handler
    #[serde(default = "default_http_timeout", with = "humantime_duration")]
    pub http_timeout: Duration,

    /// Upper bound on any single handler invocation (unset: unbounded)
    #[serde(default, with = "humantime_duration_opt")]
    pub handler_timeout: Option<Duration>,

    /// Retries allowed per execution for handler failures
    #[serde(default)]
    pub max_retries: u32,

    /// Initial wait between retries
    #[serde(default = "default_retry_backoff", with = "humantime_duration")]
    pub retry_backoff: Duration,

    #[serde(default = "default_retry_backoff_multiplier")]
    pub retry_backoff_multiplier: f64,

    #[serde(default, with = "humantime_duration")]
    pub retry_jitter: Duration,

    /// Node visits allowed per execution before aborting
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Executions allowed in flight for one event
    #[serde(default = "default_max_concurrent_executions")]
    pub max_concurrent_executions: usize,

    /// Validate every node's properties before traversal
    #[serde(default = "default_preflight_validation")]
    pub preflight_validation: bool,

    /// Directory for JSON execution records (unset: records are not written)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_retry_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_steps() -> usize {
    1000
}

fn default_max_concurrent_executions() -> usize {
    16
}

fn default_preflight_validation() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            http_timeout: default_http_timeout(),
            handler_timeout: None,
            max_retries: 0,
            retry_backoff: default_retry_backoff(),
            retry_backoff_multiplier: default_retry_backoff_multiplier(),
            retry_jitter: Duration::ZERO,
            max_steps: default_max_steps(),
            max_concurrent_executions: default_max_concurrent_executions(),
            preflight_validation: default_preflight_validation(),
            state_dir: None,
        }
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod humantime_duration_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => humantime::parse_duration(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
