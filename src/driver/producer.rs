//! The production side of a paced stream.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use backflow_proto::{BoxError, Generator, Pull};
use futures_util::stream::{LocalBoxStream, Stream, StreamExt};

/// Outcome of one production step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Yield<T> {
    /// A value to push; production continues afterwards.
    Next(T),
    /// Production is over, optionally with a final value.
    Return(Option<T>),
}

/// A pull-style production loop whose steps may suspend.
///
/// `poll_produce` is not called again after it returned [`Yield::Return`]
/// or an error.
pub trait Producer<T, E> {
    /// Attempt to produce the next step.
    fn poll_produce(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Yield<T>, E>>;

    /// Release whatever the producer holds. Runs at most once.
    fn release(self: Pin<&mut Self>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Type-erased producer.
pub type BoxProducer<T, E> = Pin<Box<dyn Producer<T, E>>>;

impl<T, E, P> Producer<T, E> for Pin<Box<P>>
where
    P: Producer<T, E> + ?Sized,
{
    fn poll_produce(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Yield<T>, E>> {
        self.get_mut().as_mut().poll_produce(cx)
    }

    fn release(self: Pin<&mut Self>) -> Result<(), BoxError> {
        self.get_mut().as_mut().release()
    }
}

/// Producer over a fallible stream. Exhaustion returns without a final value.
pub struct StreamProducer<T, E> {
    stream: LocalBoxStream<'static, Result<T, E>>,
}

impl<T, E> Producer<T, E> for StreamProducer<T, E> {
    fn poll_produce(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Yield<T>, E>> {
        self.get_mut()
            .stream
            .poll_next_unpin(cx)
            .map(|item| match item {
                Some(Ok(value)) => Ok(Yield::Next(value)),
                Some(Err(error)) => Err(error),
                None => Ok(Yield::Return(None)),
            })
    }
}

impl<T, E> fmt::Debug for StreamProducer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProducer").finish_non_exhaustive()
    }
}

/// Adapt a stream of results.
pub fn from_stream<S, T, E>(stream: S) -> StreamProducer<T, E>
where
    S: Stream<Item = Result<T, E>> + 'static,
{
    StreamProducer {
        stream: StreamExt::boxed_local(stream),
    }
}

/// Producer over an in-memory collection; never suspends.
///
/// Like every in-memory source, the last item is returned as the final value.
pub struct IterProducer<I: Iterator> {
    pull: Pull<I>,
}

// Never structurally pinned.
impl<I: Iterator> Unpin for IterProducer<I> {}

impl<I, E> Producer<I::Item, E> for IterProducer<I>
where
    I: Iterator,
{
    fn poll_produce(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<Yield<I::Item>, E>> {
        let pulled = match Generator::<(), Infallible>::next(&mut self.get_mut().pull, ()) {
            Ok(pulled) => pulled,
            // Pull only fails on `throw_error`, which is never called here.
            Err(_) => return Poll::Ready(Ok(Yield::Return(None))),
        };
        Poll::Ready(Ok(match (pulled.done, pulled.value) {
            (false, Some(value)) => Yield::Next(value),
            (_, value) => Yield::Return(value),
        }))
    }
}

impl<I: Iterator> fmt::Debug for IterProducer<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterProducer")
            .field("finished", &self.pull.is_finished())
            .finish()
    }
}

/// Adapt an in-memory collection.
pub fn from_iter<C>(items: C) -> IterProducer<C::IntoIter>
where
    C: IntoIterator,
{
    IterProducer {
        pull: Pull::new(items),
    }
}

/// A producer with an extra release step.
pub struct Released<T, E> {
    inner: BoxProducer<T, E>,
    release: Option<Box<dyn FnOnce() -> Result<(), BoxError>>>,
}

impl<T, E> Producer<T, E> for Released<T, E> {
    fn poll_produce(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Yield<T>, E>> {
        self.get_mut().inner.as_mut().poll_produce(cx)
    }

    fn release(self: Pin<&mut Self>) -> Result<(), BoxError> {
        let this = self.get_mut();
        let inner = this.inner.as_mut().release();
        let own = this.release.take().map_or(Ok(()), |release| release());
        inner.and(own)
    }
}

impl<T, E> fmt::Debug for Released<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Released")
            .field("pending", &self.release.is_some())
            .finish_non_exhaustive()
    }
}

/// Combinators for producers.
pub trait ProducerExt<T, E>: Producer<T, E> + Sized + 'static {
    /// Box and pin the producer.
    fn boxed_local(self) -> BoxProducer<T, E> {
        Box::pin(self)
    }

    /// Run `release` after the producer's own release step.
    fn with_release<F>(self, release: F) -> Released<T, E>
    where
        F: FnOnce() -> Result<(), BoxError> + 'static,
    {
        Released {
            inner: self.boxed_local(),
            release: Some(Box::new(release)),
        }
    }
}

impl<T, E, P> ProducerExt<T, E> for P where P: Producer<T, E> + Sized + 'static {}

/// Producer owned jointly by a drive and its subscription's teardown.
///
/// Whoever gets to it first releases it; the drive only polls while the
/// slot is still occupied. Releasing wakes a drive parked on the producer.
pub(crate) struct ProducerSlot<T, E> {
    inner: Rc<SlotInner<T, E>>,
}

struct SlotInner<T, E> {
    producer: RefCell<Option<BoxProducer<T, E>>>,
    parked: Cell<Option<Waker>>,
}

impl<T, E> Clone for ProducerSlot<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T, E> ProducerSlot<T, E> {
    pub(crate) fn new(producer: BoxProducer<T, E>) -> Self {
        Self {
            inner: Rc::new(SlotInner {
                producer: RefCell::new(Some(producer)),
                parked: Cell::new(None),
            }),
        }
    }

    /// Poll the producer. `Ready(None)` once it has been released.
    pub(crate) fn poll_produce(&self, cx: &mut Context<'_>) -> Poll<Option<Result<Yield<T>, E>>> {
        let mut slot = self.inner.producer.borrow_mut();
        let polled = match slot.as_mut() {
            Some(producer) => producer.as_mut().poll_produce(cx).map(Some),
            None => return Poll::Ready(None),
        };
        if polled.is_pending() {
            self.inner.parked.set(Some(cx.waker().clone()));
        }
        polled
    }

    /// Take the producer out and release it.
    ///
    /// If the producer is being polled right now, nothing happens; the
    /// drive releases it once it reaches its terminal state.
    pub(crate) fn release(&self) -> Result<(), BoxError> {
        let producer = match self.inner.producer.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => return Ok(()),
        };
        if let Some(waker) = self.inner.parked.take() {
            waker.wake();
        }
        match producer {
            Some(mut producer) => producer.as_mut().release(),
            None => Ok(()),
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.inner
            .producer
            .try_borrow()
            .is_ok_and(|slot| slot.is_none())
    }
}
