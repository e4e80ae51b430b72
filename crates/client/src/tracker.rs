//! Queue tracking task.
//!
//! Drives a `QueuePoller` on the tokio clock: wait the initial delay, read the
//! queue status, feed the result to the poller, sleep whatever it decides,
//! repeat until it reports an outcome. Progress goes out as `PollEvent`s.
//!
//! Every await point races the cancellation token, so cancelling (or dropping
//! the handle) stops the task at the next suspension without another read.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cardmail_common::error::AppError;
use cardmail_common::types::DispatchId;
use cardmail_engine::poller::{PollDecision, PollOutcome, PollSchedule, ProgressReport, QueuePoller};

use crate::api::CardscanApi;

/// Observable milestones of one tracking cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Progress(ProgressReport),
    Retrying {
        attempt: u32,
        after: Duration,
        error: String,
    },
    Finished(PollOutcome),
}

pub struct QueueTracker;

impl QueueTracker {
    /// Spawn the tracking task for an accepted dispatch.
    pub fn spawn(
        api: Arc<dyn CardscanApi>,
        schedule: PollSchedule,
        dispatch_id: DispatchId,
    ) -> TrackerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            api,
            QueuePoller::new(schedule),
            dispatch_id,
            tx,
            cancel.clone(),
        ));

        TrackerHandle {
            dispatch_id,
            events: rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner of a running tracking task. Dropping it cancels the task.
pub struct TrackerHandle {
    dispatch_id: DispatchId,
    events: mpsc::UnboundedReceiver<PollEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<PollOutcome, AppError>>>,
}

impl TrackerHandle {
    pub fn dispatch_id(&self) -> DispatchId {
        self.dispatch_id
    }

    /// Next event, or `None` once the task has ended and the channel drained.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait for the cycle to end. Dropping this future leaves the task running
    /// and still owned by the handle.
    pub async fn wait(&mut self) -> Result<PollOutcome, AppError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(PollOutcome::Cancelled);
        };

        let joined = task.await;
        self.task = None;
        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(PollOutcome::Cancelled),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    api: Arc<dyn CardscanApi>,
    mut poller: QueuePoller,
    dispatch_id: DispatchId,
    events: mpsc::UnboundedSender<PollEvent>,
    cancel: CancellationToken,
) -> Result<PollOutcome, AppError> {
    let initial_delay = match poller.arm() {
        Ok(delay) => delay,
        Err(e) => {
            tracing::error!(dispatch_id = %dispatch_id, error = %e, "Queue poller refused to arm");
            return Ok(PollOutcome::Cancelled);
        }
    };
    tracing::debug!(dispatch_id = %dispatch_id, delay_ms = initial_delay.as_millis() as u64, "Queue tracking armed");

    tokio::select! {
        _ = cancel.cancelled() => return Ok(cancelled(&mut poller, dispatch_id, &events)),
        _ = tokio::time::sleep(initial_delay) => {}
    }

    if let Err(e) = poller.start() {
        tracing::error!(dispatch_id = %dispatch_id, error = %e, "Queue poller refused to start");
        return Ok(PollOutcome::Cancelled);
    }

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => return Ok(cancelled(&mut poller, dispatch_id, &events)),
            read = api.queue_status() => read,
        };

        let (decision, failure) = match read {
            Ok(status) => (poller.observe(&status), None),
            Err(e) => (poller.record_failure(&e), Some(e)),
        };
        let decision = match decision {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(dispatch_id = %dispatch_id, error = %e, "Queue poller out of step");
                return Ok(PollOutcome::Cancelled);
            }
        };

        let after = match decision {
            PollDecision::Continue { after, progress } => {
                tracing::info!(
                    dispatch_id = %dispatch_id,
                    sent = progress.sent,
                    queued = progress.queued,
                    "Dispatch in progress"
                );
                let _ = events.send(PollEvent::Progress(progress));
                after
            }
            PollDecision::Retry { after, attempt } => {
                let error = failure.map(|e| e.to_string()).unwrap_or_default();
                tracing::warn!(
                    dispatch_id = %dispatch_id,
                    attempt,
                    retry_in_ms = after.as_millis() as u64,
                    error = %error,
                    "Queue status read failed, retrying"
                );
                let _ = events.send(PollEvent::Retrying {
                    attempt,
                    after,
                    error,
                });
                after
            }
            PollDecision::Finished(outcome) => {
                let _ = events.send(PollEvent::Finished(outcome.clone()));
                return match (outcome, failure) {
                    (PollOutcome::Exhausted { attempts, .. }, Some(cause)) => {
                        tracing::error!(
                            dispatch_id = %dispatch_id,
                            attempts,
                            error = %cause,
                            "Queue status unavailable, giving up"
                        );
                        Err(AppError::Poll { attempts, cause })
                    }
                    (outcome, _) => {
                        tracing::info!(dispatch_id = %dispatch_id, outcome = %outcome, "Dispatch finished");
                        Ok(outcome)
                    }
                };
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => return Ok(cancelled(&mut poller, dispatch_id, &events)),
            _ = tokio::time::sleep(after) => {}
        }
    }
}

fn cancelled(
    poller: &mut QueuePoller,
    dispatch_id: DispatchId,
    events: &mpsc::UnboundedSender<PollEvent>,
) -> PollOutcome {
    let outcome = poller.cancel().unwrap_or(PollOutcome::Cancelled);
    tracing::info!(dispatch_id = %dispatch_id, "Queue tracking cancelled");
    let _ = events.send(PollEvent::Finished(outcome.clone()));
    outcome
}
