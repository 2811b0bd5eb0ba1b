//! Error types for the notification contract.
//!
//! A [`Fault`] is an out-of-band failure: something went wrong *around* a
//! stream (a consumer blew up, a resource refused to close). In-band stream
//! errors travel as [`Notification::Error`](crate::Notification::Error) and
//! never show up here.

use thiserror::Error;

use crate::notification::NotificationKind;

/// Type-erased error used by consumer and release failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Out-of-band failures raised by generators and their lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Fault {
    /// A generator's `next`/`throw_error`/`complete` implementation failed.
    #[error("consumer failed: {0}")]
    Consumer(#[source] BoxError),

    /// A teardown step failed while releasing the underlying resource.
    #[error("release failed: {0}")]
    Release(#[source] BoxError),

    /// A notification arrived while a previous call into the same generator
    /// had not yet returned.
    #[error("re-entrant {kind} notification while a call is still outstanding")]
    Reentrant {
        /// Kind of the notification that was rejected.
        kind: NotificationKind,
    },

    /// An error was thrown into a pull generator that has no way to handle it.
    #[error("uncaught error thrown into generator: {0}")]
    Uncaught(String),

    /// A paced drive could not be handed to the executor.
    #[error("failed to schedule drive: {0}")]
    Schedule(#[source] BoxError),
}

impl Fault {
    /// Wrap any error as a consumer failure.
    pub fn consumer<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Consumer(error.into())
    }

    /// Wrap any error as a release failure.
    pub fn release<E>(error: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Release(error.into())
    }

    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Consumer(_) => "consumer_failure",
            Self::Release(_) => "release_failure",
            Self::Reentrant { .. } => "reentrant_notification",
            Self::Uncaught(_) => "uncaught_error",
            Self::Schedule(_) => "schedule_failure",
        }
    }
}
