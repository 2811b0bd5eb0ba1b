//! # backflow
//!
//! A push/pull stream engine. Producers push [`Notification`]s into
//! observers through a lifecycle decorator that guarantees a single
//! terminal notification and a single release of the producer's resource.
//! A backpressure driver paces producers by waiting on each observer's
//! [`Settlement`] before pushing again.
//!
//! Everything runs on one thread: handles are `Rc`-based and drives are
//! spawned with a [`Spawn`] implementation such as [`TokioLocal`] or a
//! `futures_executor::LocalSpawner`.
//!
//! ```rust
//! use backflow::{observer, Observable};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let s = Rc::clone(&seen);
//! Observable::<i32, String>::of(vec![1, 2, 3])
//!     .map(|v| v * 2)
//!     .subscribe(observer().on_next_sync(move |v| s.borrow_mut().push(v)))
//!     .unwrap();
//! assert_eq!(*seen.borrow(), vec![2, 4]);
//! ```

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod observable;
pub mod observer;
mod ops;
pub mod source;
pub mod telemetry;
pub mod timer;

pub use backflow_proto::{
    BoxError, BoxObserver, Fault, Generator, IterationResult, Notification, NotificationKind,
    Observer, Pull, Settlement, Step,
};

pub use self::config::Config;
pub use self::driver::{from_iter, from_stream, DriveOutcome, Producer, ProducerExt, Spawn, TokioLocal, Yield};
pub use self::engine::Engine;
pub use self::error::EngineError;
pub use self::lifecycle::{Decorated, DoneFlag, Teardown};
pub use self::observable::{Observable, Observation, Subscriber};
pub use self::observer::{observer, FnObserver};
pub use self::source::{Emitter, EventSource, Handler, UnsubscribeToken};
pub use self::timer::interval;
