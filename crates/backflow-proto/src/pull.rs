//! The iterator role: generators that are pulled rather than pushed into.

use std::fmt;
use std::iter::Peekable;

use crate::error::Fault;
use crate::generator::{Generator, Step};
use crate::iteration::IterationResult;
use crate::notification::Notification;

/// Pull-mode generator over an in-memory iterator.
///
/// Each `next(())` answers the following item. The last item is reported
/// together with `done = true`, so `[1, 2, 3]` reads as value(1), value(2),
/// final(3). Once finished, every call answers [`IterationResult::closed`].
pub struct Pull<I: Iterator> {
    iter: Option<Peekable<I>>,
}

impl<I: Iterator> Pull<I> {
    /// Wrap an iterator.
    pub fn new<C>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: Some(items.into_iter().peekable()),
        }
    }

    /// Returns `true` once the generator has reported `done`.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.iter.is_none()
    }
}

impl<I: Iterator> fmt::Debug for Pull<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pull")
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl<I, E> Generator<(), E> for Pull<I>
where
    I: Iterator,
    E: fmt::Display,
{
    type Output = I::Item;

    fn next(&mut self, _value: ()) -> Step<Self::Output> {
        let Some(iter) = self.iter.as_mut() else {
            return Ok(IterationResult::closed());
        };

        match iter.next() {
            Some(item) if iter.peek().is_some() => Ok(IterationResult::yielded(item)),
            last => {
                self.iter = None;
                Ok(IterationResult::finished(last))
            }
        }
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        if self.iter.take().is_none() {
            return Ok(IterationResult::closed());
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(error = %error, "error thrown into pull generator");
        Err(Fault::Uncaught(error.to_string()))
    }

    fn complete(&mut self, _value: Option<()>) -> Step<Self::Output> {
        self.iter = None;
        Ok(IterationResult::closed())
    }
}

/// Pull a generator until it reports `done`, collecting what it produced.
///
/// Live replies without a value are skipped; a generator that never finishes
/// keeps this loop spinning.
pub fn drain<G, E>(generator: &mut G) -> Result<Vec<Notification<G::Output, E>>, Fault>
where
    G: Generator<(), E> + ?Sized,
{
    let mut out = Vec::new();
    loop {
        let reply = generator.next(())?;
        if reply.done {
            out.push(Notification::Final(reply.value));
            return Ok(out);
        }
        if let Some(value) = reply.value {
            out.push(Notification::Value(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Pulled = Vec<Notification<i32, String>>;

    #[test]
    fn debug_does_not_need_debug_items() {
        struct Opaque;
        let mut pull = Pull::new(vec![Opaque]);
        assert_eq!(format!("{pull:?}"), "Pull { finished: false, .. }");
        let _ = Generator::<(), String>::next(&mut pull, ()).unwrap();
        assert_eq!(format!("{pull:?}"), "Pull { finished: true, .. }");
    }

    #[test]
    fn last_item_is_final() {
        let mut pull = Pull::new(vec![1, 2, 3]);
        let pulled: Pulled = drain(&mut pull).unwrap();
        assert_eq!(
            pulled,
            vec![
                Notification::Value(1),
                Notification::Value(2),
                Notification::Final(Some(3)),
            ]
        );
        assert!(pull.is_finished());
    }

    #[test]
    fn empty_iterator_closes_without_value() {
        let mut pull = Pull::new(Vec::<i32>::new());
        let pulled: Pulled = drain(&mut pull).unwrap();
        assert_eq!(pulled, vec![Notification::Final(None)]);
    }

    #[test]
    fn finished_generator_stays_closed() {
        let mut pull = Pull::new(vec![7]);
        let first = Generator::<(), String>::next(&mut pull, ()).unwrap();
        assert_eq!(first, IterationResult::finished(Some(7)));
        for _ in 0..3 {
            let again = Generator::<(), String>::next(&mut pull, ()).unwrap();
            assert_eq!(again, IterationResult::closed());
        }
        let thrown = Generator::<(), String>::throw_error(&mut pull, "late".into()).unwrap();
        assert!(thrown.done);
    }

    #[test]
    fn throw_into_live_pull_is_not_swallowed() {
        let mut pull = Pull::new(1..10);
        let err = Generator::<(), String>::throw_error(&mut pull, "stop".into()).unwrap_err();
        assert!(matches!(err, Fault::Uncaught(ref msg) if msg == "stop"));
        assert!(pull.is_finished());
    }

    #[test]
    fn complete_finishes_early() {
        let mut pull = Pull::new(1..10);
        let _ = Generator::<(), String>::next(&mut pull, ()).unwrap();
        let done = Generator::<(), String>::complete(&mut pull, None).unwrap();
        assert!(done.done);
        let after = Generator::<(), String>::next(&mut pull, ()).unwrap();
        assert_eq!(after, IterationResult::closed());
    }
}
