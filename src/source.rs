//! Event-source capability and an in-memory emitter.
//!
//! Adapters for timers, sockets or change feeds only need to implement
//! [`EventSource`]: accept a handler, call it for every event, and hand back
//! an [`UnsubscribeToken`] that detaches it.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use backflow_proto::{Fault, Notification};
use tracing::trace;

/// Callback a source invokes for every event.
pub type Handler<T, E> = Box<dyn FnMut(Notification<T, E>) -> Result<(), Fault>>;

/// Narrow capability for push-style event sources.
pub trait EventSource<T, E> {
    /// Register `handler`. The returned token detaches it.
    fn listen(&self, handler: Handler<T, E>) -> UnsubscribeToken;
}

/// One-shot detach handle returned by [`EventSource::listen`].
#[must_use = "dropping the token without detaching leaves the handler registered"]
pub struct UnsubscribeToken(Box<dyn FnOnce()>);

impl UnsubscribeToken {
    /// Wrap a detach closure.
    pub fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(detach))
    }

    /// Detach the handler.
    pub fn detach(self) {
        (self.0)()
    }
}

impl fmt::Debug for UnsubscribeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("UnsubscribeToken(..)")
    }
}

type SharedHandler<T, E> = Rc<RefCell<Handler<T, E>>>;

struct Listeners<T, E> {
    next_id: u64,
    entries: Vec<(u64, SharedHandler<T, E>)>,
}

impl<T, E> Listeners<T, E> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry, _)| *entry == id)
    }
}

/// In-memory multi-listener event source.
///
/// Every emitted notification goes to each listener registered at the time
/// of the call. Listeners may detach (or new ones attach) while a
/// notification is being delivered.
pub struct Emitter<T, E> {
    listeners: Rc<RefCell<Listeners<T, E>>>,
}

impl<T, E> Default for Emitter<T, E> {
    fn default() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T, E> Clone for Emitter<T, E> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<T, E> fmt::Debug for Emitter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T: Clone, E: Clone> Emitter<T, E> {
    /// Create an emitter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `notification` to every current listener.
    ///
    /// Delivery continues past a failing handler; the first failure is
    /// returned.
    pub fn emit(&self, notification: Notification<T, E>) -> Result<(), Fault> {
        let snapshot: Vec<(u64, SharedHandler<T, E>)> = self.listeners.borrow().entries.clone();
        trace!(kind = %notification.kind(), listeners = snapshot.len(), "emit");

        let mut first_fault = None;
        for (id, handler) in snapshot {
            if !self.listeners.borrow().contains(id) {
                continue;
            }
            let outcome = match handler.try_borrow_mut() {
                Ok(mut callback) => (*callback)(notification.clone()),
                Err(_) => Err(Fault::Reentrant {
                    kind: notification.kind(),
                }),
            };
            if let Err(fault) = outcome {
                first_fault.get_or_insert(fault);
            }
        }
        first_fault.map_or(Ok(()), Err)
    }

    /// Shorthand for emitting a value.
    pub fn emit_value(&self, value: T) -> Result<(), Fault> {
        self.emit(Notification::Value(value))
    }
}

impl<T, E> Emitter<T, E> {
    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl<T: 'static, E: 'static> EventSource<T, E> for Emitter<T, E> {
    fn listen(&self, handler: Handler<T, E>) -> UnsubscribeToken {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Rc::new(RefCell::new(handler))));
            id
        };

        let weak: Weak<RefCell<Listeners<T, E>>> = Rc::downgrade(&self.listeners);
        UnsubscribeToken::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }
}
