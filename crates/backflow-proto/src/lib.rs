//! # backflow-proto
//!
//! The sans-IO contract underneath `backflow`: the notification vocabulary
//! and the generator shape shared by pull-style iterators and push-style
//! observers.
//!
//! ## Features
//!
//! - [`Notification`]: value, error and final-value notifications
//! - [`IterationResult`]: the `(done, value)` reply to every call
//! - [`Generator`]: `next` / `throw_error` / `complete`, usable in both directions
//! - [`Settlement`]: an observer's reply telling a producer whether it may push again
//! - [`Pull`]: the iterator role over in-memory collections
//! - Optional `serde` derives and `tracing` diagnostics
//!
//! ## Quick Start
//!
//! ```rust
//! use backflow_proto::{drain, Notification, Pull};
//!
//! let mut pull = Pull::new(vec![1, 2, 3]);
//! let seen: Vec<Notification<i32, String>> = drain(&mut pull).unwrap();
//! assert_eq!(
//!     seen,
//!     vec![
//!         Notification::Value(1),
//!         Notification::Value(2),
//!         Notification::Final(Some(3)),
//!     ]
//! );
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod generator;
pub mod iteration;
pub mod notification;
pub mod pull;

pub use self::error::{BoxError, Fault};
pub use self::generator::{BoxObserver, Generator, Observer, Settlement, Step};
pub use self::iteration::IterationResult;
pub use self::notification::{Notification, NotificationKind};
pub use self::pull::{drain, Pull};
