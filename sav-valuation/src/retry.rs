//! Retry state machine for a single valuation call
//!
//! The machine owns no I/O. The client feeds it events (attempt outcome,
//! delay elapsed, cancellation) and asks it what to do next, so exhaustion
//! and cancellation can be tested without a transport.
//!
//! Transition table:
//!
//! | Phase      | Event                         | Next phase                          |
//! |------------|-------------------------------|-------------------------------------|
//! | Idle       | Start                         | Sending                             |
//! | Sending    | Succeeded(r)                  | Succeeded(r)                        |
//! | Sending    | Failed(e), e terminal         | Failed(e)                           |
//! | Sending    | Failed(e), e transient, budget| Retrying { delay }                  |
//! | Sending    | Failed(e), e transient, none  | Failed(ExhaustedRetries)            |
//! | Retrying   | DelayElapsed                  | Sending                             |
//! | non-final  | Cancelled                     | Failed(Cancelled)                   |

use crate::backoff::{next_attempt, Backoff, RetryPolicy};
use crate::error::ValuationError;
use sav_common::ValuationResult;
use std::time::Duration;

/// Per-call retry bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    /// Attempts already made
    pub attempt: u32,
    /// Most recent failure
    pub last_error: Option<ValuationError>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Idle,
    Sending,
    Retrying { delay: Duration },
    Succeeded(ValuationResult),
    Failed(ValuationError),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Succeeded(_) | Phase::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Sending => "sending",
            Phase::Retrying { .. } => "retrying",
            Phase::Succeeded(_) => "succeeded",
            Phase::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start,
    Succeeded(ValuationResult),
    Failed(ValuationError),
    DelayElapsed,
    Cancelled,
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Start => "start",
            Event::Succeeded(_) => "succeeded",
            Event::Failed(_) => "failed",
            Event::DelayElapsed => "delay_elapsed",
            Event::Cancelled => "cancelled",
        }
    }
}

/// What the driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Perform one transport attempt
    Send,
    /// Sleep, then report `DelayElapsed`
    Wait(Duration),
    /// Call is over; take the outcome
    Finish,
}

#[derive(Debug)]
pub struct RetryMachine {
    policy: RetryPolicy,
    phase: Phase,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            phase: Phase::Idle,
            state: RetryState::default(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Apply one event; invalid events leave the phase unchanged
    pub fn handle(&mut self, event: Event) -> &Phase {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);

        self.phase = match (phase, event) {
            (Phase::Idle, Event::Start) => Phase::Sending,

            (Phase::Sending, Event::Succeeded(result)) => {
                self.state.attempt += 1;
                Phase::Succeeded(result)
            }

            (Phase::Sending, Event::Failed(err)) => {
                self.state.attempt += 1;
                self.after_failure(err)
            }

            (Phase::Retrying { .. }, Event::DelayElapsed) => Phase::Sending,

            (phase, Event::Cancelled) if !phase.is_terminal() => Phase::Failed(
                ValuationError::Cancelled {
                    attempts: self.state.attempt,
                },
            ),

            (phase, event) => {
                tracing::warn!(
                    phase = phase.name(),
                    event = event.name(),
                    "Ignoring event not valid in current phase"
                );
                phase
            }
        };

        &self.phase
    }

    fn after_failure(&mut self, err: ValuationError) -> Phase {
        if !err.is_retryable() {
            self.state.last_error = Some(err.clone());
            return Phase::Failed(err);
        }

        match next_attempt(self.state.attempt, &self.policy) {
            Backoff::Proceed(delay) => {
                self.state.last_error = Some(err);
                Phase::Retrying { delay }
            }
            Backoff::Stop => {
                let exhausted = ValuationError::ExhaustedRetries {
                    attempts: self.state.attempt,
                    last_error: err.to_string(),
                };
                self.state.last_error = Some(err);
                Phase::Failed(exhausted)
            }
        }
    }

    pub fn next_step(&self) -> Step {
        match &self.phase {
            // The driver must send Start first; treat Idle as ready to send
            Phase::Idle | Phase::Sending => Step::Send,
            Phase::Retrying { delay } => Step::Wait(*delay),
            Phase::Succeeded(_) | Phase::Failed(_) => Step::Finish,
        }
    }

    /// Terminal outcome, or `None` if the call has not finished
    pub fn into_outcome(self) -> Option<Result<ValuationResult, ValuationError>> {
        match self.phase {
            Phase::Succeeded(result) => Some(Ok(result)),
            Phase::Failed(err) => Some(Err(err)),
            _ => None,
        }
    }
}
