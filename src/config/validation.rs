//! Configuration validation.
//!
//! Validates configuration before an engine is built to catch common errors early.

use super::Config;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("driver.step_budget must be greater than zero")]
    ZeroStepBudget,
    #[error("logging.filter is not a valid filter directive '{filter}': {reason}")]
    InvalidLogFilter { filter: String, reason: String },
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.driver.step_budget == 0 {
        errors.push(ValidationError::ZeroStepBudget);
    }

    if let Err(e) = EnvFilter::try_new(&config.logging.filter) {
        errors.push(ValidationError::InvalidLogFilter {
            filter: config.logging.filter.clone(),
            reason: e.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
