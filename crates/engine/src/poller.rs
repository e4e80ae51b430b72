//! Queue poller: state machine that follows a submitted job to completion.
//!
//! ```text
//! IDLE --arm--> ARMED --start--> POLLING --processing=false--> DONE
//!                                  |  ^
//!                                  +--+ processing=true / failed read
//! ```
//!
//! The machine only decides; it never sleeps or performs I/O. The async
//! driver in `cardmail-client` waits for the returned delays and feeds status
//! snapshots back in. `DONE` is terminal for a cycle: only a fresh `arm`
//! (after a new accepted submission) starts another one.
//!
//! Failed status reads are retried with exponential backoff; once more than
//! `max_retries` consecutive reads fail the cycle ends as `Exhausted` so the
//! caller can surface it instead of leaving the job unresolved.

use std::time::Duration;

use cardmail_common::config::AppConfig;
use cardmail_common::types::QueueStatus;
use thiserror::Error;

/// Lifecycle states of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Armed,
    Polling,
    Done,
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollerState::Idle => write!(f, "idle"),
            PollerState::Armed => write!(f, "armed"),
            PollerState::Polling => write!(f, "polling"),
            PollerState::Done => write!(f, "done"),
        }
    }
}

/// Timing of a polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Wait before the first read, so the queue can register the job
    pub initial_delay: Duration,
    /// Wait between reads while the queue is still processing
    pub interval: Duration,
    /// Consecutive failed reads tolerated before the cycle is abandoned
    pub max_retries: u32,
    /// Delay after the first failed read; doubles for each further one
    pub retry_backoff: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            interval: Duration::from_secs(3),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl PollSchedule {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.poll_initial_delay_ms),
            interval: Duration::from_millis(config.poll_interval_ms),
            max_retries: config.poll_max_retries,
            retry_backoff: Duration::from_millis(config.poll_retry_backoff_ms),
        }
    }

    /// Delay before retry number `failures` (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(1u32 << exponent)
    }
}

/// Intermediate progress, reported once per processing snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressReport {
    pub sent: u64,
    pub queued: u64,
}

impl std::fmt::Display for ProgressReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sent {}, remaining {}", self.sent, self.queued)
    }
}

/// How a polling cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { sent: u64, failed: u64 },
    Exhausted { attempts: u32, error: String },
    Cancelled,
}

impl std::fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollOutcome::Completed { sent, failed } => {
                write!(f, "completed: sent {}, failed {}", sent, failed)
            }
            PollOutcome::Exhausted { attempts, error } => {
                write!(f, "status unavailable after {} attempts: {}", attempts, error)
            }
            PollOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What the driver should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Queue still processing: report, then read again after `after`.
    Continue {
        after: Duration,
        progress: ProgressReport,
    },
    /// The read failed: read again after `after`.
    Retry { after: Duration, attempt: u32 },
    /// Cycle over; schedule nothing further.
    Finished(PollOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {action} a poller that is {state}")]
pub struct TransitionError {
    pub state: PollerState,
    pub action: &'static str,
}

/// Queue polling state machine.
#[derive(Debug)]
pub struct QueuePoller {
    state: PollerState,
    schedule: PollSchedule,
    consecutive_failures: u32,
    outcome: Option<PollOutcome>,
}

impl QueuePoller {
    pub fn new(schedule: PollSchedule) -> Self {
        Self {
            state: PollerState::Idle,
            schedule,
            consecutive_failures: 0,
            outcome: None,
        }
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn schedule(&self) -> &PollSchedule {
        &self.schedule
    }

    /// Outcome of the last finished cycle.
    pub fn outcome(&self) -> Option<&PollOutcome> {
        self.outcome.as_ref()
    }

    /// Armed or polling: a job is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self.state, PollerState::Armed | PollerState::Polling)
    }

    /// Start a new cycle after an accepted submission.
    /// Returns the delay before the first read.
    pub fn arm(&mut self) -> Result<Duration, TransitionError> {
        match self.state {
            PollerState::Idle | PollerState::Done => {
                self.state = PollerState::Armed;
                self.consecutive_failures = 0;
                self.outcome = None;
                Ok(self.schedule.initial_delay)
            }
            state => Err(TransitionError {
                state,
                action: "arm",
            }),
        }
    }

    /// The initial delay has elapsed; reads may begin.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.state != PollerState::Armed {
            return Err(TransitionError {
                state: self.state,
                action: "start",
            });
        }
        self.state = PollerState::Polling;
        Ok(())
    }

    /// Feed one status snapshot.
    pub fn observe(&mut self, status: &QueueStatus) -> Result<PollDecision, TransitionError> {
        self.ensure_polling("observe")?;
        self.consecutive_failures = 0;

        if status.processing {
            return Ok(PollDecision::Continue {
                after: self.schedule.interval,
                progress: ProgressReport {
                    sent: status.sent,
                    queued: status.queued,
                },
            });
        }

        Ok(self.finish(PollOutcome::Completed {
            sent: status.sent,
            failed: status.failed,
        }))
    }

    /// Record a failed status read.
    pub fn record_failure(
        &mut self,
        error: &dyn std::fmt::Display,
    ) -> Result<PollDecision, TransitionError> {
        self.ensure_polling("record a failure on")?;
        self.consecutive_failures += 1;

        if self.consecutive_failures > self.schedule.max_retries {
            return Ok(self.finish(PollOutcome::Exhausted {
                attempts: self.consecutive_failures,
                error: error.to_string(),
            }));
        }

        Ok(PollDecision::Retry {
            after: self.schedule.backoff(self.consecutive_failures),
            attempt: self.consecutive_failures,
        })
    }

    /// Abandon an in-flight cycle. Returns `None` when nothing was in flight.
    pub fn cancel(&mut self) -> Option<PollOutcome> {
        if !self.is_active() {
            return None;
        }
        match self.finish(PollOutcome::Cancelled) {
            PollDecision::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    fn ensure_polling(&self, action: &'static str) -> Result<(), TransitionError> {
        if self.state == PollerState::Polling {
            Ok(())
        } else {
            Err(TransitionError {
                state: self.state,
                action,
            })
        }
    }

    fn finish(&mut self, outcome: PollOutcome) -> PollDecision {
        self.state = PollerState::Done;
        self.outcome = Some(outcome.clone());
        PollDecision::Finished(outcome)
    }
}

impl Default for QueuePoller {
    fn default() -> Self {
        Self::new(PollSchedule::default())
    }
}
