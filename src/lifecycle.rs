//! Lifecycle decorator: exactly-once teardown for a generator.
//!
//! [`Decorated`] wraps a generator together with a [`DoneFlag`] and a
//! [`Teardown`]. Whichever termination path is taken first (the producer
//! calls `throw_error`/`complete`, the wrapped generator answers `done`, or
//! the consumer cancels) sets the flag and runs the teardown. Everything
//! that arrives afterwards is ignored.
//!
//! The handle is cheap to clone: the source side pushes through one clone
//! while the consumer holds another inside its `Observation`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use backflow_proto::{
    BoxError, BoxObserver, Fault, Generator, IterationResult, Notification, NotificationKind, Step,
};
use tracing::{debug, warn};

/// Shared "this subscription has ended" cell.
///
/// Owned jointly by the decorator and whoever drives it, for the lifetime of
/// one subscription.
#[derive(Clone, Default)]
pub struct DoneFlag(Rc<Cell<bool>>);

impl DoneFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the subscription has ended.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.get()
    }

    /// Set the flag. Returns `true` only for the call that flipped it.
    pub(crate) fn set(&self) -> bool {
        !self.0.replace(true)
    }
}

impl fmt::Debug for DoneFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DoneFlag").field(&self.is_set()).finish()
    }
}

/// Release step run when a subscription ends.
pub struct Teardown(Box<dyn FnOnce() -> Result<(), BoxError>>);

impl Teardown {
    /// Wrap a release closure.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + 'static,
    {
        Self(Box::new(release))
    }

    /// A teardown with nothing to release.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    fn run(self) -> Result<(), BoxError> {
        (self.0)()
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Teardown(..)")
    }
}

struct Inner<T, E, G> {
    generator: RefCell<G>,
    done: DoneFlag,
    teardown: Cell<Option<Teardown>>,
    /// Terminal notification that arrived while a call into `generator`
    /// was still on the stack.
    deferred: Cell<Option<Notification<T, E>>>,
}

/// A generator wrapped with lifecycle tracking.
pub struct Decorated<T, E, G = BoxObserver<T, E>> {
    inner: Rc<Inner<T, E, G>>,
}

impl<T, E, G> Clone for Decorated<T, E, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E, G> fmt::Debug for Decorated<T, E, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorated")
            .field("done", &self.inner.done.is_set())
            .finish_non_exhaustive()
    }
}

impl<T, E, G> Decorated<T, E, G>
where
    G: Generator<T, E>,
{
    /// Wrap `generator`, running `teardown` exactly once when it terminates.
    pub fn new(generator: G, teardown: Teardown) -> Self {
        Self::with_flag(generator, teardown, DoneFlag::new())
    }

    /// Wrap `generator` around an existing done flag.
    pub fn with_flag(generator: G, teardown: Teardown, done: DoneFlag) -> Self {
        Self {
            inner: Rc::new(Inner {
                generator: RefCell::new(generator),
                done,
                teardown: Cell::new(Some(teardown)),
                deferred: Cell::new(None),
            }),
        }
    }

    /// The flag shared with anyone driving this generator.
    pub fn done_flag(&self) -> DoneFlag {
        self.inner.done.clone()
    }

    /// Returns `true` once the channel has terminated.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.inner.done.is_set()
    }

    /// Deliver a notification through the decorator.
    pub fn push(&self, notification: Notification<T, E>) -> Step<G::Output> {
        match notification {
            Notification::Value(value) => self.push_value(value),
            terminal => self.terminate(terminal),
        }
    }

    /// Consumer-side cancellation.
    ///
    /// Runs the teardown and hands the wrapped generator its one terminal
    /// notification, `complete(None)`. A no-op once the channel has ended.
    pub fn cancel(&self) -> Result<(), Fault> {
        self.terminate(Notification::Final(None)).map(drop)
    }

    /// Run the teardown without notifying the wrapped generator.
    ///
    /// Used when the wrapped generator itself failed and must not be called
    /// again.
    pub fn release(&self) -> Result<(), Fault> {
        self.fire_teardown().map_err(Fault::Release)
    }

    fn push_value(&self, value: T) -> Step<G::Output> {
        if self.is_done() {
            debug!(kind = %NotificationKind::Value, "ignoring notification on terminated channel");
            return Ok(IterationResult::closed());
        }

        let reply = {
            let Ok(mut generator) = self.inner.generator.try_borrow_mut() else {
                return Err(Fault::Reentrant {
                    kind: NotificationKind::Value,
                });
            };
            generator.next(value)
        };

        match reply {
            Ok(reply) if reply.done => {
                // The generator ended the channel itself; whatever arrived
                // meanwhile would be post-terminal.
                self.inner.deferred.take();
                self.fire_teardown().map_err(Fault::Release)?;
                Ok(reply)
            }
            Ok(reply) => {
                self.flush_deferred()?;
                Ok(reply)
            }
            Err(fault) => {
                if let Err(flush) = self.flush_deferred() {
                    warn!(error = %flush, "deferred terminal notification failed after consumer fault");
                }
                Err(fault)
            }
        }
    }

    fn terminate(&self, notification: Notification<T, E>) -> Step<G::Output> {
        if self.is_done() {
            debug!(kind = %notification.kind(), "ignoring notification on terminated channel");
            return Ok(IterationResult::closed());
        }

        // Release first so the resource goes away even if forwarding fails.
        let released = self.fire_teardown();

        let forwarded = match self.inner.generator.try_borrow_mut() {
            Ok(mut generator) => generator.dispatch(notification),
            Err(_) => {
                self.inner.deferred.set(Some(notification));
                Ok(IterationResult::closed())
            }
        };

        match (forwarded, released) {
            (Ok(reply), Ok(())) => Ok(reply),
            (Ok(_), Err(release)) => Err(Fault::Release(release)),
            (Err(fault), Ok(())) => Err(fault),
            (Err(fault), Err(release)) => {
                warn!(error = %release, "release failed while forwarding a terminal notification failed too");
                Err(fault)
            }
        }
    }

    fn flush_deferred(&self) -> Result<(), Fault> {
        let Some(notification) = self.inner.deferred.take() else {
            return Ok(());
        };
        let mut generator = self
            .inner
            .generator
            .try_borrow_mut()
            .map_err(|_| Fault::Reentrant {
                kind: notification.kind(),
            })?;
        generator.dispatch(notification).map(drop)
    }

    fn fire_teardown(&self) -> Result<(), BoxError> {
        if !self.inner.done.set() {
            return Ok(());
        }
        match self.inner.teardown.take() {
            Some(teardown) => teardown.run(),
            None => Ok(()),
        }
    }
}

impl<T, E, G> Generator<T, E> for Decorated<T, E, G>
where
    G: Generator<T, E>,
{
    type Output = G::Output;

    fn next(&mut self, value: T) -> Step<Self::Output> {
        self.push_value(value)
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        self.terminate(Notification::Error(error))
    }

    fn complete(&mut self, value: Option<T>) -> Step<Self::Output> {
        self.terminate(Notification::Final(value))
    }
}
