#![allow(clippy::result_large_err)]

use super::HephestosConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &HephestosConfig) -> Result<(), AppError> {
        let engine = &config.engine;
        if engine.http_timeout.is_zero() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "engine.http_timeout must be greater than zero",
            ));
        }

        if engine.max_steps == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "engine.max_steps must be >= 1",
            ));
        }

        if engine.max_concurrent_executions == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "engine.max_concurrent_executions must be >= 1",
            ));
        }

        if !engine.retry_backoff_multiplier.is_finite() || engine.retry_backoff_multiplier < 1.0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "engine.retry_backoff_multiplier must be a finite number >= 1.0",
            ));
        }

        Ok(())
    }
}
