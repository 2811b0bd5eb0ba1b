//! The generator contract: one shape for both pulling and pushing.
//!
//! A [`Generator`] receives three kinds of calls (`next`, `throw_error`,
//! `complete`) and answers each with an [`IterationResult`]. Called by a
//! consumer, it is an iterator ("call these to pull"). Called by a producer,
//! it is an observer ("call these to push").
//!
//! The generator itself is deliberately minimal: it does not guard against
//! calls that arrive after it reported `done`. Callers (usually the lifecycle
//! decorator in the `backflow` crate) are responsible for post-terminal
//! silence.

use std::fmt;
use std::future::Future;

use futures_util::future::LocalBoxFuture;

use crate::error::Fault;
use crate::iteration::IterationResult;
use crate::notification::Notification;

/// Result of a single generator call.
pub type Step<R> = Result<IterationResult<R>, Fault>;

/// A bidirectional notification endpoint.
pub trait Generator<T, E> {
    /// Payload carried back in each [`IterationResult`].
    type Output;

    /// Deliver a value.
    fn next(&mut self, value: T) -> Step<Self::Output>;

    /// Deliver a terminal error. Nothing may follow.
    fn throw_error(&mut self, error: E) -> Step<Self::Output>;

    /// Deliver the terminal final value. Nothing may follow.
    fn complete(&mut self, value: Option<T>) -> Step<Self::Output>;

    /// Route a [`Notification`] to the matching method.
    fn dispatch(&mut self, notification: Notification<T, E>) -> Step<Self::Output> {
        match notification {
            Notification::Value(v) => self.next(v),
            Notification::Error(e) => self.throw_error(e),
            Notification::Final(v) => self.complete(v),
        }
    }
}

impl<T, E, G> Generator<T, E> for &mut G
where
    G: Generator<T, E> + ?Sized,
{
    type Output = G::Output;

    fn next(&mut self, value: T) -> Step<Self::Output> {
        (**self).next(value)
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        (**self).throw_error(error)
    }

    fn complete(&mut self, value: Option<T>) -> Step<Self::Output> {
        (**self).complete(value)
    }
}

impl<T, E, G> Generator<T, E> for Box<G>
where
    G: Generator<T, E> + ?Sized,
{
    type Output = G::Output;

    fn next(&mut self, value: T) -> Step<Self::Output> {
        (**self).next(value)
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        (**self).throw_error(error)
    }

    fn complete(&mut self, value: Option<T>) -> Step<Self::Output> {
        (**self).complete(value)
    }
}

/// How an observer's handling of a notification settled.
///
/// An observer that finishes its work inside the call answers
/// [`Settlement::Ready`]. One that has to wait on something answers
/// [`Settlement::Deferred`]; a backpressure-aware producer will not push
/// again until that future resolves.
pub enum Settlement<E> {
    /// Handling finished synchronously.
    Ready,
    /// Handling finishes when the future resolves. A rejection is forwarded
    /// back to the observer as a terminal error.
    Deferred(LocalBoxFuture<'static, Result<(), E>>),
}

impl<E> Settlement<E> {
    /// Handling already finished.
    #[must_use]
    pub fn ready() -> Self {
        Self::Ready
    }

    /// Handling finishes when `future` resolves.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), E>> + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Returns `true` if handling is still outstanding.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl<E> Default for Settlement<E> {
    fn default() -> Self {
        Self::Ready
    }
}

impl<E> fmt::Debug for Settlement<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// A generator used in the push direction: its replies carry a
/// [`Settlement`].
pub trait Observer<T, E>: Generator<T, E, Output = Settlement<E>> {}

impl<T, E, G> Observer<T, E> for G where G: Generator<T, E, Output = Settlement<E>> + ?Sized {}

/// Type-erased observer.
pub type BoxObserver<T, E> = Box<dyn Observer<T, E>>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Records everything it is told and stops after `limit` values.
    struct Tally {
        seen: Vec<Notification<i32, String>>,
        limit: usize,
    }

    impl Generator<i32, String> for Tally {
        type Output = Settlement<String>;

        fn next(&mut self, value: i32) -> Step<Self::Output> {
            self.seen.push(Notification::Value(value));
            if self.seen.len() >= self.limit {
                Ok(IterationResult::closed())
            } else {
                Ok(IterationResult::yielded(Settlement::ready()))
            }
        }

        fn throw_error(&mut self, error: String) -> Step<Self::Output> {
            self.seen.push(Notification::Error(error));
            Ok(IterationResult::closed())
        }

        fn complete(&mut self, value: Option<i32>) -> Step<Self::Output> {
            self.seen.push(Notification::Final(value));
            Ok(IterationResult::closed())
        }
    }

    #[test]
    fn dispatch_routes_by_kind() {
        let mut tally = Tally {
            seen: Vec::new(),
            limit: 10,
        };
        tally.dispatch(Notification::Value(1)).unwrap();
        tally.dispatch(Notification::Error("e".into())).unwrap();
        tally.dispatch(Notification::Final(Some(2))).unwrap();
        assert_eq!(
            tally.seen,
            vec![
                Notification::Value(1),
                Notification::Error("e".into()),
                Notification::Final(Some(2)),
            ]
        );
    }

    #[test]
    fn boxed_observer_forwards() {
        let mut boxed: BoxObserver<i32, String> = Box::new(Tally {
            seen: Vec::new(),
            limit: 2,
        });
        assert!(!boxed.next(1).unwrap().done);
        assert!(boxed.next(2).unwrap().done);
    }

    #[test]
    fn borrowed_generator_forwards() {
        fn finish<G: Generator<i32, String>>(mut generator: G) {
            generator.complete(None).unwrap();
        }

        let mut tally = Tally {
            seen: Vec::new(),
            limit: 5,
        };
        finish(&mut tally);
        assert_eq!(tally.seen, vec![Notification::Final(None)]);
    }

    #[test]
    fn deferred_settlement_resolves() {
        let settlement: Settlement<String> = Settlement::deferred(async { Ok(()) });
        assert!(settlement.is_deferred());
        match settlement {
            Settlement::Deferred(fut) => {
                assert_eq!(futures_executor::block_on(fut), Ok(()));
            }
            Settlement::Ready => panic!("expected deferred settlement"),
        }
    }
}
