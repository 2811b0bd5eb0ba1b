//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, DriverConfig, LoggingConfig)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: checks run before an engine accepts a config

mod defaults;
mod types;
mod validation;

pub use types::{Config, ConfigError, DriverConfig, LoggingConfig};
pub use validation::{validate, ValidationError};
