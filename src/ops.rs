//! Composition sugar built on the primitives.
//!
//! Every operator subscribes a relay generator upstream and decorates the
//! downstream consumer with a teardown that cancels that upstream
//! subscription. Ending either side therefore ends both, and each side
//! still releases exactly once.

use std::cell::RefCell;
use std::rc::Rc;

use backflow_proto::{Fault, Generator, IterationResult, Notification, Settlement, Step};
use tracing::warn;

use crate::lifecycle::{Decorated, Teardown};
use crate::observable::{Observable, Observation};
use crate::observer::observer;

/// Where a relay sends one upstream value.
enum Route<U> {
    Emit(U),
    Skip,
    /// Deliver as the final value and stop.
    Last(U),
}

type RouteFn<T, U> = Box<dyn FnMut(T) -> Route<U>>;

struct Relay<T, E, U, E2> {
    downstream: Decorated<U, E2>,
    route: RouteFn<T, U>,
    map_error: Rc<dyn Fn(E) -> E2>,
}

impl<T, E, U: 'static, E2: 'static> Relay<T, E, U, E2> {
    /// Push downstream; a failing consumer is released before the fault
    /// travels upstream.
    fn forward(&self, notification: Notification<U, E2>) -> Step<Settlement<E2>> {
        self.downstream.push(notification).inspect_err(|_| {
            if let Err(release) = self.downstream.release() {
                warn!(error = %release, "release failed after downstream consumer fault");
            }
        })
    }

    /// Carry a downstream settlement back upstream.
    ///
    /// A rejection terminates the downstream consumer directly; its teardown
    /// then cancels upstream.
    fn settlement(&self, settlement: Option<Settlement<E2>>) -> Settlement<E> {
        match settlement {
            Some(Settlement::Deferred(pending)) => {
                let downstream = self.downstream.clone();
                Settlement::deferred(async move {
                    if let Err(rejected) = pending.await {
                        if let Err(fault) = downstream.push(Notification::Error(rejected)) {
                            warn!(error = %fault, "failed to deliver settlement rejection downstream");
                        }
                    }
                    Ok(())
                })
            }
            _ => Settlement::Ready,
        }
    }
}

impl<T, E, U: 'static, E2: 'static> Generator<T, E> for Relay<T, E, U, E2> {
    type Output = Settlement<E>;

    fn next(&mut self, value: T) -> Step<Self::Output> {
        match (self.route)(value) {
            Route::Skip => Ok(IterationResult::yielded(Settlement::Ready)),
            Route::Emit(value) => {
                let reply = self.forward(Notification::Value(value))?;
                if reply.done {
                    return Ok(IterationResult::closed());
                }
                Ok(IterationResult::yielded(self.settlement(reply.value)))
            }
            Route::Last(value) => {
                self.forward(Notification::Final(Some(value)))?;
                Ok(IterationResult::closed())
            }
        }
    }

    fn throw_error(&mut self, error: E) -> Step<Self::Output> {
        self.forward(Notification::Error((self.map_error)(error)))?;
        Ok(IterationResult::closed())
    }

    fn complete(&mut self, value: Option<T>) -> Step<Self::Output> {
        let last = match value.map(&mut self.route) {
            Some(Route::Emit(value) | Route::Last(value)) => Some(value),
            Some(Route::Skip) | None => None,
        };
        self.forward(Notification::Final(last))?;
        Ok(IterationResult::closed())
    }
}

impl<T: 'static, E: 'static> Observable<T, E> {
    fn relay<U, E2, R>(&self, route: R, map_error: Rc<dyn Fn(E) -> E2>) -> Observable<U, E2>
    where
        U: 'static,
        E2: 'static,
        R: Fn() -> RouteFn<T, U> + 'static,
    {
        let upstream = self.clone();
        Observable::create(move |subscriber| {
            let slot: Rc<RefCell<Option<Observation<T, E>>>> = Rc::default();
            let cancel = Rc::clone(&slot);
            let downstream = subscriber.decorate(Teardown::new(move || {
                let observation = cancel.borrow_mut().take();
                match observation {
                    Some(observation) => observation.unobserve().map_err(Into::into),
                    None => Ok(()),
                }
            }));

            let relay = Relay {
                downstream: downstream.clone(),
                route: route(),
                map_error: Rc::clone(&map_error),
            };
            let observation = match upstream.subscribe(relay) {
                Ok(observation) => observation,
                Err(fault) => {
                    if let Err(release) = downstream.release() {
                        warn!(error = %release, "release failed after upstream subscribe failed");
                    }
                    return Err(fault);
                }
            };

            if downstream.is_done() {
                // Finished while upstream was still delivering synchronously.
                observation.unobserve()?;
            } else {
                *slot.borrow_mut() = Some(observation);
            }
            Ok(downstream)
        })
    }

    fn passthrough_errors() -> Rc<dyn Fn(E) -> E> {
        Rc::new(|error: E| error)
    }

    /// Transform every value, including the final one.
    pub fn map<U, F>(&self, f: F) -> Observable<U, E>
    where
        U: 'static,
        F: Fn(T) -> U + 'static,
    {
        let f = Rc::new(f);
        self.relay(
            move || {
                let f = Rc::clone(&f);
                Box::new(move |value: T| Route::Emit(f(value)))
            },
            Self::passthrough_errors(),
        )
    }

    /// Transform the terminal error.
    pub fn map_err<E2, F>(&self, f: F) -> Observable<T, E2>
    where
        E2: 'static,
        F: Fn(E) -> E2 + 'static,
    {
        self.relay(|| -> RouteFn<T, T> { Box::new(Route::Emit) }, Rc::new(f))
    }

    /// Keep only values matching `predicate`. A rejected final value
    /// completes without one.
    pub fn filter<F>(&self, predicate: F) -> Observable<T, E>
    where
        F: Fn(&T) -> bool + 'static,
    {
        let predicate = Rc::new(predicate);
        self.relay(
            move || {
                let predicate = Rc::clone(&predicate);
                Box::new(move |value: T| {
                    if predicate(&value) {
                        Route::Emit(value)
                    } else {
                        Route::Skip
                    }
                })
            },
            Self::passthrough_errors(),
        )
    }

    /// Deliver at most `n` values; the `n`th arrives as the final value and
    /// the upstream subscription is cancelled.
    pub fn take(&self, n: usize) -> Observable<T, E> {
        if n == 0 {
            return Observable::empty();
        }
        self.relay(
            move || {
                let mut seen = 0;
                Box::new(move |value: T| {
                    seen += 1;
                    if seen >= n {
                        Route::Last(value)
                    } else {
                        Route::Emit(value)
                    }
                })
            },
            Self::passthrough_errors(),
        )
    }

    /// Subscribe with a handler for every value, the final one included.
    pub fn for_each<F>(&self, f: F) -> Result<Observation<T, E>, Fault>
    where
        F: FnMut(T) + 'static,
    {
        let f = Rc::new(RefCell::new(f));
        let last = Rc::clone(&f);
        self.subscribe(
            observer()
                .on_next_sync(move |value: T| (&mut *f.borrow_mut())(value))
                .on_complete(move |value: Option<T>| {
                    if let Some(value) = value {
                        (&mut *last.borrow_mut())(value);
                    }
                }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{from_iter, ProducerExt};
    use crate::source::Emitter;
    use futures_executor::LocalPool;
    use std::cell::Cell;

    type Log<T> = Rc<RefCell<Vec<Notification<T, String>>>>;

    fn recorder<T: 'static>(log: &Log<T>) -> crate::observer::FnObserver<T, String> {
        let (a, b, c) = (Rc::clone(log), Rc::clone(log), Rc::clone(log));
        observer()
            .on_next_sync(move |v| a.borrow_mut().push(Notification::Value(v)))
            .on_error(move |e| b.borrow_mut().push(Notification::Error(e)))
            .on_complete(move |v| c.borrow_mut().push(Notification::Final(v)))
    }

    #[test]
    fn map_transforms_values_and_final() {
        let log = Log::default();
        Observable::<i32, String>::of(vec![1, 2, 3])
            .map(|v| v * 10)
            .subscribe(recorder(&log))
            .unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                Notification::Value(10),
                Notification::Value(20),
                Notification::Final(Some(30)),
            ]
        );
    }

    #[test]
    fn filter_drops_rejected_final() {
        let log = Log::default();
        Observable::<i32, String>::of(vec![1, 2, 3, 5])
            .filter(|v| v % 2 == 0)
            .subscribe(recorder(&log))
            .unwrap();
        assert_eq!(
            *log.borrow(),
            vec![Notification::Value(2), Notification::Final(None)]
        );
    }

    #[test]
    fn map_err_rewrites_error() {
        let log: Log<i32> = Log::default();
        Observable::<i32, u16>::fail(404)
            .map_err(|code| format!("status {code}"))
            .subscribe(recorder(&log))
            .unwrap();
        assert_eq!(*log.borrow(), vec![Notification::Error("status 404".into())]);
    }

    #[test]
    fn take_stops_a_live_source() {
        let emitter: Emitter<i32, String> = Emitter::new();
        let log = Log::default();
        let observation = Observable::from_source(emitter.clone())
            .take(2)
            .subscribe(recorder(&log))
            .unwrap();
        assert_eq!(emitter.listener_count(), 1);

        emitter.emit_value(1).unwrap();
        emitter.emit_value(2).unwrap();
        emitter.emit_value(3).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![Notification::Value(1), Notification::Final(Some(2))]
        );
        assert_eq!(emitter.listener_count(), 0);
        assert!(observation.is_closed());
    }

    #[test]
    fn take_zero_completes_immediately() {
        let emitter: Emitter<i32, String> = Emitter::new();
        let log = Log::default();
        Observable::from_source(emitter.clone())
            .take(0)
            .subscribe(recorder(&log))
            .unwrap();
        assert_eq!(*log.borrow(), vec![Notification::Final(None)]);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn unobserve_downstream_detaches_upstream() {
        let emitter: Emitter<i32, String> = Emitter::new();
        let log = Log::default();
        let observation = Observable::from_source(emitter.clone())
            .map(|v| v + 1)
            .subscribe(recorder(&log))
            .unwrap();
        emitter.emit_value(1).unwrap();
        observation.unobserve().unwrap();
        emitter.emit_value(2).unwrap();

        assert_eq!(emitter.listener_count(), 0);
        assert_eq!(
            *log.borrow(),
            vec![Notification::Value(2), Notification::Final(None)]
        );
    }

    #[test]
    fn take_releases_a_paced_producer_early() {
        let mut pool = LocalPool::new();
        let released = Rc::new(Cell::new(0));
        let r = Rc::clone(&released);
        let numbers = Observable::<i32, String>::generate(pool.spawner(), 16, move || {
            let r = Rc::clone(&r);
            from_iter(1..).with_release(move || {
                r.set(r.get() + 1);
                Ok(())
            })
        });

        let log = Log::default();
        numbers.take(3).subscribe(recorder(&log)).unwrap();
        pool.run();

        assert_eq!(
            *log.borrow(),
            vec![
                Notification::Value(1),
                Notification::Value(2),
                Notification::Final(Some(3)),
            ]
        );
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn downstream_fault_detaches_the_whole_chain() {
        let emitter: Emitter<i32, String> = Emitter::new();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let observation = Observable::from_source(emitter.clone())
            .map(|v| v * 2)
            .subscribe(observer::<i32, String>().try_on_next(move |v: i32| {
                c.set(c.get() + 1);
                if v < 0 {
                    Err("negative".into())
                } else {
                    Ok(Settlement::Ready)
                }
            }))
            .unwrap();

        emitter.emit_value(1).unwrap();
        let fault = emitter.emit_value(-1).unwrap_err();
        assert!(matches!(fault, Fault::Consumer(_)));
        assert!(observation.is_closed());
        assert_eq!(emitter.listener_count(), 0);

        emitter.emit_value(3).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn for_each_sees_every_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let observation = Observable::<i32, String>::of(vec![4, 5])
            .for_each(move |v| s.borrow_mut().push(v))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![4, 5]);
        assert!(observation.is_closed());
    }
}
