//! Pluggable single-threaded scheduling for drives.

use backflow_proto::Fault;
use futures_executor::LocalSpawner;
use futures_util::future::LocalBoxFuture;
use futures_util::task::LocalSpawnExt;

/// Something that can run a `!Send` future to completion.
pub trait Spawn {
    /// Hand `future` to the executor.
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) -> Result<(), Fault>;
}

impl<S: Spawn + ?Sized> Spawn for &S {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) -> Result<(), Fault> {
        (**self).spawn_local(future)
    }
}

impl<S: Spawn + ?Sized> Spawn for std::rc::Rc<S> {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) -> Result<(), Fault> {
        (**self).spawn_local(future)
    }
}

/// Spawns onto the current tokio `LocalSet`.
///
/// Must be used from inside `LocalSet::run_until` (or a task spawned on
/// one); tokio panics otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioLocal;

impl Spawn for TokioLocal {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) -> Result<(), Fault> {
        drop(tokio::task::spawn_local(future));
        Ok(())
    }
}

impl Spawn for LocalSpawner {
    fn spawn_local(&self, future: LocalBoxFuture<'static, ()>) -> Result<(), Fault> {
        LocalSpawnExt::spawn_local(self, future).map_err(|e| Fault::Schedule(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_executor::LocalPool;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn local_spawner_runs_on_pool() {
        let mut pool = LocalPool::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        Spawn::spawn_local(&pool.spawner(), Box::pin(async move { r.set(true) })).unwrap();
        assert!(!ran.get());
        pool.run();
        assert!(ran.get());
    }

    #[test]
    fn spawn_after_pool_dropped_is_schedule_fault() {
        let spawner = LocalPool::new().spawner();
        let err = Spawn::spawn_local(&spawner, Box::pin(async {})).unwrap_err();
        assert_eq!(err.error_code(), "schedule_failure");
    }

    #[tokio::test]
    async fn tokio_local_runs_inside_local_set() {
        let local = tokio::task::LocalSet::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        local
            .run_until(async move {
                TokioLocal
                    .spawn_local(Box::pin(async move {
                        let _ = tx.send(7);
                    }))
                    .unwrap();
                assert_eq!(rx.await.unwrap(), 7);
            })
            .await;
    }
}
