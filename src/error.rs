//! Unified error handling for backflow.
//!
//! Stream-level failures live in [`Fault`]; this module adds what can go
//! wrong while setting an engine up.

use backflow_proto::Fault;
use thiserror::Error;

use crate::config::{ConfigError, ValidationError};

/// Errors raised while building or running an [`Engine`](crate::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid configuration: {}", join(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Fault(#[from] Fault),
}

impl EngineError {
    /// Get a static error code string for log labeling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(ConfigError::Io(_)) => "config_io",
            Self::Config(ConfigError::Parse(_)) => "config_parse",
            Self::Invalid(_) => "config_invalid",
            Self::Fault(fault) => fault.error_code(),
        }
    }
}

impl From<Vec<ValidationError>> for EngineError {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self::Invalid(errors)
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_lists_every_problem() {
        let err = EngineError::from(vec![
            ValidationError::ZeroStepBudget,
            ValidationError::InvalidLogFilter {
                filter: "x=y".into(),
                reason: "bad level".into(),
            },
        ]);
        assert_eq!(err.error_code(), "config_invalid");
        let text = err.to_string();
        assert!(text.contains("step_budget"));
        assert!(text.contains("x=y"));
    }

    #[test]
    fn fault_code_passes_through() {
        let err = EngineError::from(Fault::consumer("boom"));
        assert_eq!(err.error_code(), "consumer_failure");
    }
}
