//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Driver Defaults
// =============================================================================

/// Synchronous steps a drive takes before yielding to the scheduler.
pub fn default_step_budget() -> usize {
    64
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
