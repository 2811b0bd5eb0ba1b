//! Integration test common infrastructure.
//!
//! Recording observers, teardown counters and hand-released settlements
//! shared by the integration suites.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use backflow::{observer, FnObserver, Notification, Settlement, Teardown};
use tokio::sync::oneshot;

pub type Log<T = i32, E = String> = Rc<RefCell<Vec<Notification<T, E>>>>;

/// Observer that records every notification and settles immediately.
pub fn recording<T: 'static, E: 'static>(log: &Log<T, E>) -> FnObserver<T, E> {
    let (a, b, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
    observer()
        .on_next_sync(move |v| a.borrow_mut().push(Notification::Value(v)))
        .on_error(move |e| b.borrow_mut().push(Notification::Error(e)))
        .on_complete(move |v| c.borrow_mut().push(Notification::Final(v)))
}

/// Counts how often a teardown ran.
#[derive(Clone, Default)]
pub struct ReleaseCounter(Rc<Cell<usize>>);

impl ReleaseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn teardown(&self) -> Teardown {
        let count = Rc::clone(&self.0);
        Teardown::new(move || {
            count.set(count.get() + 1);
            Ok(())
        })
    }

    /// Release step for `ProducerExt::with_release`.
    pub fn release_fn(&self) -> impl FnOnce() -> Result<(), backflow::BoxError> + use<> {
        let count = Rc::clone(&self.0);
        move || {
            count.set(count.get() + 1);
            Ok(())
        }
    }

    pub fn count(&self) -> usize {
        self.0.get()
    }
}

/// Settlements resolved by hand from the test body.
///
/// Every `next` hands out a deferred settlement and parks its sender here,
/// so the test decides when (and how) the consumer finishes with a value.
pub struct Gate<E> {
    pending: Rc<RefCell<Vec<oneshot::Sender<Result<(), E>>>>>,
}

impl<E> Clone for Gate<E> {
    fn clone(&self) -> Self {
        Self {
            pending: Rc::clone(&self.pending),
        }
    }
}

impl<E: 'static> Gate<E> {
    pub fn new() -> Self {
        Self {
            pending: Rc::default(),
        }
    }

    /// A deferred settlement controlled through this gate.
    pub fn settlement(&self) -> Settlement<E> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().push(tx);
        Settlement::deferred(async move {
            match rx.await {
                Ok(result) => result,
                // Sender dropped: treat as accepted.
                Err(_) => Ok(()),
            }
        })
    }

    /// Number of settlements still waiting.
    pub fn waiting(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Resolve the oldest waiting settlement.
    pub fn resolve(&self, result: Result<(), E>) -> bool {
        let sender = {
            let mut pending = self.pending.borrow_mut();
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        sender.send(result).is_ok()
    }
}

/// Observer recording into `log` whose every value waits on `gate`.
pub fn gated<T: 'static, E: 'static>(log: &Log<T, E>, gate: &Gate<E>) -> FnObserver<T, E> {
    let (b, c) = (Rc::clone(log), Rc::clone(log));
    let a = Rc::clone(log);
    let gate = gate.clone();
    observer()
        .on_next(move |v| {
            a.borrow_mut().push(Notification::Value(v));
            gate.settlement()
        })
        .on_error(move |e| b.borrow_mut().push(Notification::Error(e)))
        .on_complete(move |v| c.borrow_mut().push(Notification::Final(v)))
}
