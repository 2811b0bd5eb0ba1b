//! Tracing setup and span helpers.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(1);

/// Allocate a diagnostic id for a new subscription.
pub fn next_subscription_id() -> u64 {
    NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed)
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the configured filter. Returns `false` if a global
/// subscriber was already installed, in which case nothing changes.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{debug_span, info_span, Span};

    /// Span for one subscription, from `subscribe` through `unobserve`.
    pub fn subscription(id: u64) -> Span {
        debug_span!("subscription", id)
    }

    /// Span for a spawned drive.
    pub fn drive(budget: usize) -> Span {
        info_span!("drive", budget)
    }
}
