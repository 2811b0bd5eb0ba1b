//! Observables: producer capabilities that push into a decorated observer.
//!
//! An [`Observable`] is nothing but its observer definition. Each
//! [`subscribe`](Observable::subscribe) runs the definition against a fresh
//! [`Subscriber`]; the definition decorates it with the teardown for
//! whatever resource it owns, wires the source to the decorated handle, and
//! returns that handle. The consumer gets it back wrapped in an
//! [`Observation`].

use std::cell::Cell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use backflow_proto::{BoxObserver, Fault, Generator, Notification, Observer, Pull, Settlement, Step};
use futures_util::FutureExt;
use tracing::{debug, warn};

use crate::lifecycle::{Decorated, DoneFlag, Teardown};
use crate::source::{EventSource, UnsubscribeToken};
use crate::telemetry::{self, spans};

type Definition<T, E> = dyn Fn(Subscriber<T, E>) -> Result<Decorated<T, E>, Fault>;

/// The consumer handed to an observer definition, not yet decorated.
pub struct Subscriber<T, E> {
    observer: BoxObserver<T, E>,
    done: DoneFlag,
}

impl<T: 'static, E: 'static> Subscriber<T, E> {
    /// Wrap the consumer with the lifecycle decorator.
    ///
    /// `teardown` is the sole release point for the resource this
    /// subscription owns; it runs exactly once.
    pub fn decorate(self, teardown: Teardown) -> Decorated<T, E> {
        Decorated::with_flag(self.observer, teardown, self.done)
    }
}

impl<T, E> fmt::Debug for Subscriber<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber").finish_non_exhaustive()
    }
}

/// A producer capability.
pub struct Observable<T, E> {
    definition: Rc<Definition<T, E>>,
}

impl<T, E> Clone for Observable<T, E> {
    fn clone(&self) -> Self {
        Self {
            definition: Rc::clone(&self.definition),
        }
    }
}

impl<T, E> fmt::Debug for Observable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable").finish_non_exhaustive()
    }
}

impl<T: 'static, E: 'static> Observable<T, E> {
    /// Build an observable from its observer definition.
    pub fn create<F>(definition: F) -> Self
    where
        F: Fn(Subscriber<T, E>) -> Result<Decorated<T, E>, Fault> + 'static,
    {
        Self {
            definition: Rc::new(definition),
        }
    }

    /// Attach `observer` and start delivery.
    ///
    /// Synchronous sources may deliver everything (including the terminal
    /// notification) before this returns.
    pub fn subscribe<O>(&self, observer: O) -> Result<Observation<T, E>, Fault>
    where
        O: Observer<T, E> + 'static,
    {
        let id = telemetry::next_subscription_id();
        let _span = spans::subscription(id).entered();

        let subscriber = Subscriber {
            observer: Box::new(observer),
            done: DoneFlag::new(),
        };
        let decorated = (self.definition)(subscriber)?;
        debug!(closed = decorated.is_done(), "subscribed");
        Ok(Observation { decorated, id })
    }

    /// Push every item synchronously during `subscribe`.
    ///
    /// The last item arrives as the final value; an empty collection
    /// completes without one. A deferred settlement is polled once before
    /// the next push; one that is still pending is dropped with a warning.
    /// Paced delivery is what [`crate::driver`] is for.
    pub fn of<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + 'static,
    {
        Self::create(move |subscriber| {
            let decorated = subscriber.decorate(Teardown::noop());
            let mut pull = Pull::new(items.clone());

            while !decorated.is_done() {
                let pulled = Generator::<(), Infallible>::next(&mut pull, ())?;
                let pushed = if pulled.done {
                    decorated.push(Notification::Final(pulled.value))
                } else {
                    match pulled.value {
                        Some(item) => decorated.push(Notification::Value(item)),
                        None => continue,
                    }
                };
                if let Err(fault) = settle_inline(&decorated, pushed) {
                    release_after_fault(&decorated);
                    return Err(fault);
                }
            }
            Ok(decorated)
        })
    }

    /// Complete immediately without a value.
    pub fn empty() -> Self {
        Self::create(|subscriber| {
            let decorated = subscriber.decorate(Teardown::noop());
            decorated.push(Notification::Final(None))?;
            Ok(decorated)
        })
    }

    /// Fail immediately with `error`.
    pub fn fail(error: E) -> Self
    where
        E: Clone,
    {
        Self::create(move |subscriber| {
            let decorated = subscriber.decorate(Teardown::noop());
            decorated.push(Notification::Error(error.clone()))?;
            Ok(decorated)
        })
    }

    /// Adapt an event source.
    ///
    /// The handler registered with the source pushes into the decorated
    /// observer; the teardown detaches it. A source that terminates during
    /// `listen` is detached as soon as the token comes back, and so is one
    /// whose consumer fails. Deferred settlements are handled as in
    /// [`Observable::of`].
    pub fn from_source<S>(source: S) -> Self
    where
        S: EventSource<T, E> + 'static,
    {
        let source = Rc::new(source);
        Self::create(move |subscriber| {
            let token: Rc<Cell<Option<UnsubscribeToken>>> = Rc::new(Cell::new(None));
            let detach = Rc::clone(&token);
            let decorated = subscriber.decorate(Teardown::new(move || {
                if let Some(token) = detach.take() {
                    token.detach();
                }
                Ok(())
            }));

            let sink = decorated.clone();
            let registered = source.listen(Box::new(move |notification: Notification<T, E>| {
                settle_inline(&sink, sink.push(notification)).inspect_err(|_| {
                    release_after_fault(&sink);
                })
            }));

            if decorated.is_done() {
                registered.detach();
            } else {
                token.set(Some(registered));
            }
            Ok(decorated)
        })
    }
}

/// Resolve a consumer's settlement without a scheduler.
///
/// A rejection is delivered to the consumer as its terminal error.
fn settle_inline<T: 'static, E: 'static>(
    decorated: &Decorated<T, E>,
    pushed: Step<Settlement<E>>,
) -> Result<(), Fault> {
    let Some(Settlement::Deferred(pending)) = pushed?.into_value() else {
        return Ok(());
    };
    match pending.now_or_never() {
        Some(Ok(())) => Ok(()),
        Some(Err(rejected)) => decorated.push(Notification::Error(rejected)).map(drop),
        None => {
            warn!("dropping deferred settlement that an unpaced source cannot await");
            Ok(())
        }
    }
}

fn release_after_fault<T: 'static, E: 'static>(decorated: &Decorated<T, E>) {
    if let Err(release) = decorated.release() {
        warn!(error = %release, "release failed after consumer fault");
    }
}

/// Handle for one subscription.
pub struct Observation<T, E> {
    decorated: Decorated<T, E>,
    id: u64,
}

impl<T: 'static, E: 'static> Observation<T, E> {
    /// Cancel the subscription.
    ///
    /// Runs the observable's teardown and delivers `complete(None)` to the
    /// observer. Safe to call after the subscription already ended.
    pub fn unobserve(&self) -> Result<(), Fault> {
        let _span = spans::subscription(self.id).entered();
        self.decorated.cancel()
    }

    /// Returns `true` once the subscription has ended, for any reason.
    pub fn is_closed(&self) -> bool {
        self.decorated.is_done()
    }

    /// The subscription's shared done flag.
    pub fn done_flag(&self) -> DoneFlag {
        self.decorated.done_flag()
    }

    /// Diagnostic id, matching the `subscription` span field.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T, E> fmt::Debug for Observation<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("id", &self.id)
            .field("decorated", &self.decorated)
            .finish()
    }
}
