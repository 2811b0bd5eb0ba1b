//! Closure-based observers.

use std::fmt;

use backflow_proto::{BoxError, Fault, Generator, IterationResult, Settlement, Step};

type OnNext<T, E> = Box<dyn FnMut(T) -> Result<Settlement<E>, BoxError>>;

/// An observer assembled from closures.
///
/// Handlers not provided ignore their notification.
pub struct FnObserver<T, E> {
    on_next: OnNext<T, E>,
    on_error: Box<dyn FnMut(E)>,
    on_complete: Box<dyn FnMut(Option<T>)>,
}

/// Start building a [`FnObserver`].
pub fn observer<T, E>() -> FnObserver<T, E> {
    FnObserver {
        on_next: Box::new(|_| Ok(Settlement::Ready)),
        on_error: Box::new(|_| {}),
        on_complete: Box::new(|_| {}),
    }
}

impl<T, E> FnObserver<T, E> {
    /// Handle values; the returned settlement tells a paced producer when
    /// it may push again.
    pub fn on_next<F>(self, mut f: F) -> Self
    where
        F: FnMut(T) -> Settlement<E> + 'static,
    {
        self.try_on_next(move |v| Ok(f(v)))
    }

    /// Handle values that always settle immediately.
    pub fn on_next_sync<F>(self, mut f: F) -> Self
    where
        F: FnMut(T) + 'static,
    {
        self.try_on_next(move |v| {
            f(v);
            Ok(Settlement::Ready)
        })
    }

    /// Handle values with a handler that may fail. A failure is reported to
    /// whoever pushed the value.
    pub fn try_on_next<F>(mut self, f: F) -> Self
    where
        F: FnMut(T) -> Result<Settlement<E>, BoxError> + 'static,
    {
        self.on_next = Box::new(f);
        self
    }

    /// Handle the terminal error.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(E) + 'static,
    {
        self.on_error = Box::new(f);
        self
    }

    /// Handle the terminal final value.
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnMut(Option<T>) + 'static,
    {
        self.on_complete = Box::new(f);
        self
    }
}

impl<T, E> Generator<T, E> for FnObserver<T, E> {
    type Output = Settlement<E>;

    fn next(&mut self, value: T) -> Step<Self::Output> {
        let settlement = (self.on_next)(value).map_err(Fault::Consumer)?;
        Ok(IterationResult::yielded(settlement))
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        (self.on_error)(error);
        Ok(IterationResult::closed())
    }

    fn complete(&mut self, value: Option<T>) -> Step<Self::Output> {
        (self.on_complete)(value);
        Ok(IterationResult::closed())
    }
}

impl<T, E> fmt::Debug for FnObserver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObserver").finish_non_exhaustive()
    }
}
