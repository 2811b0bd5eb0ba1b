//! The backpressure state machine.
//!
//! A [`Drive`] alternates between producing a step and pushing it into the
//! decorated consumer. When the consumer answers with a deferred
//! [`Settlement`], the drive parks in `Suspended` until it resolves; no
//! second push happens before that. The shared done flag is re-read before
//! every produce, before every push and after every suspension, since the
//! consumer may cancel at any of those points.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use backflow_proto::{Fault, Notification, Settlement, Step};
use futures_util::future::LocalBoxFuture;
use tracing::{debug, trace, warn};

use super::producer::{ProducerSlot, Yield};
use crate::lifecycle::{Decorated, DoneFlag};

/// How a drive ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// The producer returned and the consumer was completed.
    Completed,
    /// The producer (or a settlement) failed and the consumer got the error.
    Failed,
    /// The subscription ended from the consumer side.
    Cancelled,
}

impl fmt::Display for DriveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// What to do once a suspension resolves.
#[derive(Clone, Copy, Debug)]
enum Resume {
    /// Go back to producing.
    Produce,
    /// The suspension was the settlement of a terminal notification.
    Finish(DriveOutcome),
}

enum State<T, E> {
    Producing,
    Pushing(T),
    Suspended {
        settlement: LocalBoxFuture<'static, Result<(), E>>,
        resume: Resume,
    },
    Terminated(DriveOutcome),
    Finished,
}

impl<T, E> State<T, E> {
    fn name(&self) -> &'static str {
        match self {
            Self::Producing => "producing",
            Self::Pushing(_) => "pushing",
            Self::Suspended { .. } => "suspended",
            Self::Terminated(_) => "terminated",
            Self::Finished => "finished",
        }
    }
}

/// Future pacing a producer against a decorated consumer.
///
/// Resolves to the [`DriveOutcome`], or to the [`Fault`] raised by the
/// consumer (or a release step). Either way the subscription's teardown has
/// run by the time this resolves.
#[must_use = "a drive does nothing unless polled"]
pub struct Drive<T, E> {
    state: State<T, E>,
    consumer: Decorated<T, E>,
    producer: ProducerSlot<T, E>,
    done: DoneFlag,
    budget: usize,
    steps: usize,
    fault: Option<Fault>,
}

// Never structurally pinned.
impl<T, E> Unpin for Drive<T, E> {}

impl<T: 'static, E: 'static> Drive<T, E> {
    pub(crate) fn new(consumer: Decorated<T, E>, producer: ProducerSlot<T, E>, budget: usize) -> Self {
        let done = consumer.done_flag();
        Self {
            state: State::Producing,
            consumer,
            producer,
            done,
            budget: budget.max(1),
            steps: 0,
            fault: None,
        }
    }

    fn transition(&mut self, next: State<T, E>) {
        trace!(from = self.state.name(), to = next.name(), "drive transition");
        self.state = next;
    }

    /// Route the consumer's reply to a terminal notification.
    fn after_terminal(&mut self, reply: Step<Settlement<E>>, outcome: DriveOutcome) -> State<T, E> {
        match reply {
            Ok(reply) => match reply.value {
                Some(Settlement::Deferred(settlement)) => State::Suspended {
                    settlement,
                    resume: Resume::Finish(outcome),
                },
                _ => State::Terminated(outcome),
            },
            Err(fault) => {
                self.fault = Some(fault);
                State::Terminated(outcome)
            }
        }
    }

    fn produce(&mut self, cx: &mut Context<'_>) -> Poll<State<T, E>> {
        if self.done.is_set() {
            return Poll::Ready(State::Terminated(DriveOutcome::Cancelled));
        }

        let step = match self.producer.poll_produce(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(step) => step,
        };

        if self.done.is_set() {
            return Poll::Ready(State::Terminated(DriveOutcome::Cancelled));
        }

        Poll::Ready(match step {
            Some(Ok(Yield::Next(value))) => State::Pushing(value),
            Some(Ok(Yield::Return(value))) => {
                let reply = self.consumer.push(Notification::Final(value));
                self.after_terminal(reply, DriveOutcome::Completed)
            }
            Some(Err(error)) => {
                let reply = self.consumer.push(Notification::Error(error));
                self.after_terminal(reply, DriveOutcome::Failed)
            }
            // Released underneath us.
            None => State::Terminated(DriveOutcome::Cancelled),
        })
    }

    fn push(&mut self, value: T) -> State<T, E> {
        if self.done.is_set() {
            return State::Terminated(DriveOutcome::Cancelled);
        }

        match self.consumer.push(Notification::Value(value)) {
            Ok(reply) if reply.done => State::Terminated(DriveOutcome::Cancelled),
            Ok(reply) => match reply.value {
                Some(Settlement::Deferred(settlement)) => State::Suspended {
                    settlement,
                    resume: Resume::Produce,
                },
                _ => State::Producing,
            },
            Err(fault) => {
                // The consumer is not called again; only the release runs.
                if let Err(release) = self.consumer.release() {
                    warn!(error = %release, "release failed after consumer fault");
                }
                self.fault = Some(fault);
                State::Terminated(DriveOutcome::Failed)
            }
        }
    }

    fn settled(&mut self, result: Result<(), E>, resume: Resume) -> State<T, E> {
        match (resume, result) {
            (Resume::Finish(outcome), Ok(())) => State::Terminated(outcome),
            (Resume::Finish(outcome), Err(_)) => {
                debug!(%outcome, "terminal settlement rejected after the channel closed");
                State::Terminated(outcome)
            }
            (Resume::Produce, _) if self.done.is_set() => State::Terminated(DriveOutcome::Cancelled),
            (Resume::Produce, Ok(())) => State::Producing,
            (Resume::Produce, Err(error)) => {
                let reply = self.consumer.push(Notification::Error(error));
                self.after_terminal(reply, DriveOutcome::Failed)
            }
        }
    }

    fn terminate(&mut self, outcome: DriveOutcome) -> Result<DriveOutcome, Fault> {
        // Normally the teardown already released the producer; this covers a
        // teardown that fired while the producer was being polled.
        if !self.producer.is_released() {
            if let Err(release) = self.producer.release() {
                match self.fault {
                    None => self.fault = Some(Fault::Release(release)),
                    Some(_) => warn!(error = %release, "pending release failed"),
                }
            }
        }
        match self.fault.take() {
            Some(fault) => Err(fault),
            None => Ok(outcome),
        }
    }
}

impl<T: 'static, E: 'static> Future for Drive<T, E> {
    type Output = Result<DriveOutcome, Fault>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        loop {
            if this.steps >= this.budget {
                // Out of budget: let the scheduler run something else.
                this.steps = 0;
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }

            let next = match mem::replace(&mut this.state, State::Finished) {
                State::Producing => match this.produce(cx) {
                    Poll::Ready(next) => next,
                    Poll::Pending => {
                        this.state = State::Producing;
                        this.steps = 0;
                        return Poll::Pending;
                    }
                },
                State::Pushing(value) => {
                    this.steps += 1;
                    this.push(value)
                }
                State::Suspended {
                    mut settlement,
                    resume,
                } => match settlement.as_mut().poll(cx) {
                    Poll::Ready(result) => this.settled(result, resume),
                    Poll::Pending => {
                        this.state = State::Suspended { settlement, resume };
                        this.steps = 0;
                        return Poll::Pending;
                    }
                },
                State::Terminated(outcome) => {
                    this.state = State::Finished;
                    let result = this.terminate(outcome);
                    debug!(%outcome, ok = result.is_ok(), "drive terminated");
                    return Poll::Ready(result);
                }
                State::Finished => panic!("Drive polled after completion"),
            };
            this.transition(next);
        }
    }
}

impl<T, E> fmt::Debug for Drive<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive")
            .field("state", &self.state.name())
            .field("done", &self.done.is_set())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}
