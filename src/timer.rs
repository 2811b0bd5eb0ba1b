//! Interval ticks as an observable.
//!
//! An asynchronous source obeying the same contract as everything else: the
//! subscription's teardown aborts the ticking task, and a deferred settlement
//! holds back the next tick until it resolves.

use std::time::Duration;

use backflow_proto::{Notification, Settlement};
use futures_util::future::{AbortHandle, Abortable};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::driver::Spawn;
use crate::lifecycle::{Decorated, Teardown};
use crate::observable::Observable;

/// Emit `0, 1, 2, ...`, one every `period`, starting one period after
/// `subscribe`.
///
/// The ticking task is spawned on `spawner` and needs a tokio runtime with
/// the time driver enabled. A zero period is treated as one millisecond.
pub fn interval<S, E>(spawner: S, period: Duration) -> Observable<u64, E>
where
    S: Spawn + Clone + 'static,
    E: 'static,
{
    let period = period.max(Duration::from_millis(1));
    Observable::create(move |subscriber| {
        let (abort, registration) = AbortHandle::new_pair();
        let decorated = subscriber.decorate(Teardown::new(move || {
            abort.abort();
            Ok(())
        }));

        let task = Abortable::new(tick(decorated.clone(), period), registration);
        let spawned = spawner.spawn_local(Box::pin(async move {
            if task.await.is_err() {
                debug!("interval aborted");
            }
        }));
        if let Err(fault) = spawned {
            if let Err(release) = decorated.release() {
                debug!(error = %release, "release failed after spawn failure");
            }
            return Err(fault);
        }
        Ok(decorated)
    })
}

async fn tick<E>(sink: Decorated<u64, E>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut count = 0u64;
    while !sink.is_done() {
        ticker.tick().await;
        let reply = match sink.push(Notification::Value(count)) {
            Ok(reply) => reply,
            Err(fault) => {
                error!(error = %fault, code = fault.error_code(), "interval consumer failed");
                if let Err(release) = sink.release() {
                    debug!(error = %release, "release failed after consumer fault");
                }
                return;
            }
        };
        if let Some(Settlement::Deferred(settlement)) = reply.value {
            if let Err(rejected) = settlement.await {
                if let Err(fault) = sink.push(Notification::Error(rejected)) {
                    error!(error = %fault, "interval failed to deliver rejection");
                }
                return;
            }
        }
        count += 1;
    }
}
