//! The configured entry point.

use std::time::Duration;

use crate::config::{validate, Config};
use crate::driver::{Producer, Spawn};
use crate::error::EngineError;
use crate::observable::Observable;
use crate::timer;

/// A validated configuration bound to a scheduler.
///
/// Every observable built through an engine shares its step budget and
/// spawner.
#[derive(Clone, Debug)]
pub struct Engine<S> {
    config: Config,
    spawner: S,
}

impl<S> Engine<S>
where
    S: Spawn + Clone + 'static,
{
    /// Validate `config` and bind it to `spawner`.
    pub fn new(config: Config, spawner: S) -> Result<Self, EngineError> {
        validate(&config)?;
        Ok(Self { config, spawner })
    }

    /// Paced observable over a fresh producer per subscription.
    pub fn generate<T, E, F, P>(&self, factory: F) -> Observable<T, E>
    where
        T: 'static,
        E: 'static,
        F: Fn() -> P + 'static,
        P: Producer<T, E> + 'static,
    {
        Observable::generate(self.spawner.clone(), self.config.driver.step_budget, factory)
    }

    /// Observable of tick counts, one every `period`.
    pub fn interval<E: 'static>(&self, period: Duration) -> Observable<u64, E> {
        timer::interval(self.spawner.clone(), period)
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The scheduler drives are spawned on.
    pub fn spawner(&self) -> &S {
        &self.spawner
    }
}
