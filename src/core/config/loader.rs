#![allow(clippy::result_large_err)]

use super::{ConfigValidator, HephestosConfig};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Location of the engine config inside a workspace.
    pub fn workspace_config_path(workspace_path: &Path) -> PathBuf {
        workspace_path
            .join(".hephestos")
            .join("config")
            .join("engine.toml")
    }

    /// Load config from the workspace (defaults when the file is absent),
    /// apply environment overrides, then validate.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<HephestosConfig, AppError> {
        Self::load(&Self::workspace_config_path(workspace_path))
    }

    /// Same precedence as [`Self::load_from_workspace`] for an explicit path.
    pub fn load(path: &Path) -> Result<HephestosConfig, AppError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Returns Ok(None) if the file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<HephestosConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: HephestosConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut HephestosConfig) -> Result<(), AppError> {
        if let Ok(raw) = env::var("HEPHESTOS_HTTP_TIMEOUT") {
            config.engine.http_timeout = humantime::parse_duration(raw.trim()).map_err(|e| {
                AppError::new(
                    ErrorCategory::ValidationError,
                    format!("HEPHESTOS_HTTP_TIMEOUT is not a duration: {}", e),
                )
            })?;
        }

        if let Ok(raw) = env::var("HEPHESTOS_MAX_RETRIES") {
            config.engine.max_retries = parse_env_number("HEPHESTOS_MAX_RETRIES", &raw)?;
        }

        if let Ok(raw) = env::var("HEPHESTOS_MAX_CONCURRENT_EXECUTIONS") {
            config.engine.max_concurrent_executions =
                parse_env_number("HEPHESTOS_MAX_CONCURRENT_EXECUTIONS", &raw)?;
        }

        if let Ok(state_dir) = env::var("HEPHESTOS_STATE_DIR") {
            if !state_dir.trim().is_empty() {
                config.engine.state_dir = Some(PathBuf::from(state_dir));
            }
        }

        Ok(())
    }
}

fn parse_env_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AppError> {
    raw.trim().parse::<T>().map_err(|_| {
        AppError::new(
            ErrorCategory::ValidationError,
            format!("{} must be a non-negative integer, got '{}'", name, raw),
        )
    })
}
