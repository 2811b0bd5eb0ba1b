//! Backpressure-aware production.
//!
//! [`Observable::generate`] turns a [`Producer`] factory into an observable
//! whose every subscription is paced by a [`Drive`]: a value is only
//! produced once the consumer settled the previous one.

mod drive;
mod producer;
mod spawn;

pub use self::drive::{Drive, DriveOutcome};
pub use self::producer::{
    from_iter, from_stream, BoxProducer, IterProducer, Producer, ProducerExt, Released,
    StreamProducer, Yield,
};
pub use self::spawn::{Spawn, TokioLocal};

use tracing::{debug, error, Instrument};

use crate::lifecycle::Teardown;
use crate::observable::Observable;
use crate::telemetry::spans;

pub(crate) use self::producer::ProducerSlot;

impl<T: 'static, E: 'static> Observable<T, E> {
    /// Build an observable over a paced producer.
    ///
    /// `factory` runs once per subscription. The resulting drive is handed
    /// to `spawner`, so nothing is produced before `subscribe` returns. The
    /// subscription's teardown releases the producer.
    pub fn generate<S, F, P>(spawner: S, step_budget: usize, factory: F) -> Self
    where
        S: Spawn + Clone + 'static,
        F: Fn() -> P + 'static,
        P: Producer<T, E> + 'static,
    {
        Self::create(move |subscriber| {
            let slot = ProducerSlot::new(ProducerExt::boxed_local(factory()));
            let release = slot.clone();
            let decorated = subscriber.decorate(Teardown::new(move || release.release()));

            let drive = Drive::new(decorated.clone(), slot, step_budget);
            let task = async move {
                match drive.await {
                    Ok(outcome) => debug!(%outcome, "drive finished"),
                    Err(fault) => error!(error = %fault, code = fault.error_code(), "drive failed"),
                }
            }
            .instrument(spans::drive(step_budget));

            if let Err(fault) = spawner.spawn_local(Box::pin(task)) {
                if let Err(release) = decorated.release() {
                    debug!(error = %release, "release failed after spawn failure");
                }
                return Err(fault);
            }
            Ok(decorated)
        })
    }
}
