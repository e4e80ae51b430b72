//! Dispatch controller.
//!
//! Owns one session and everything needed to carry it through a dispatch:
//! resolve, upload, submit, then follow the queue. At most one dispatch is
//! in flight per controller. A failed attempt leaves the session intact so
//! the operator can correct it and try again.

use std::sync::Arc;

use cardmail_common::config::AppConfig;
use cardmail_common::error::{AppError, ValidationFailure};
use cardmail_common::types::{DispatchId, RecipientSet, SubmissionReceipt};
use cardmail_engine::job::MessageDraft;
use cardmail_engine::poller::{PollOutcome, PollSchedule};
use cardmail_engine::session::DispatchSession;
use cardmail_engine::template;

use crate::api::CardscanApi;
use crate::catalog::ContactCatalog;
use crate::submitter::DispatchSubmitter;
use crate::tracker::{PollEvent, QueueTracker, TrackerHandle};
use crate::uploader::ResourceUploader;

/// What a dispatch would send, without sending it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPreview {
    pub recipients: RecipientSet,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

/// An accepted submission. Tracking continues in the background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAccepted {
    pub dispatch_id: DispatchId,
    pub receipt: SubmissionReceipt,
}

pub struct DispatchController {
    api: Arc<dyn CardscanApi>,
    catalog: ContactCatalog,
    session: DispatchSession,
    uploader: ResourceUploader,
    submitter: DispatchSubmitter,
    schedule: PollSchedule,
    tracker: Option<TrackerHandle>,
}

impl DispatchController {
    pub fn new(api: Arc<dyn CardscanApi>, config: &AppConfig) -> Self {
        Self::with_schedule(
            api,
            PollSchedule::from_config(config),
            config.default_sender.clone(),
        )
    }

    pub fn with_schedule(
        api: Arc<dyn CardscanApi>,
        schedule: PollSchedule,
        default_sender: impl Into<String>,
    ) -> Self {
        Self {
            catalog: ContactCatalog::new(api.clone()),
            session: DispatchSession::new(MessageDraft::default()),
            uploader: ResourceUploader::new(api.clone()),
            submitter: DispatchSubmitter::new(api.clone(), default_sender),
            api,
            schedule,
            tracker: None,
        }
    }

    pub fn catalog(&self) -> &ContactCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut ContactCatalog {
        &mut self.catalog
    }

    pub fn session(&self) -> &DispatchSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DispatchSession {
        &mut self.session
    }

    /// A submitted job is still being tracked.
    pub fn is_dispatching(&self) -> bool {
        self.tracker.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Sender identity in effect: the session override, else the selected
    /// catalog name, else the configured default.
    pub fn effective_sender(&self) -> &str {
        let explicit = self
            .session
            .sender
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        self.submitter
            .sender_or_default(explicit.or(self.catalog.selected_name()))
    }

    /// Resolve recipients and render the message without any network call.
    pub fn preview(&self) -> Result<DispatchPreview, ValidationFailure> {
        let recipients = self.session.resolve(self.catalog.population())?;
        let sender = self.effective_sender().to_string();
        Ok(DispatchPreview {
            recipients,
            subject: self.session.draft.subject.clone(),
            body: template::apply_sender(&self.session.draft.body, &sender),
            sender,
        })
    }

    /// Resolve, upload, submit, and start tracking.
    pub async fn dispatch(&mut self) -> Result<DispatchAccepted, AppError> {
        if self.is_dispatching() {
            return Err(ValidationFailure::DispatchInFlight.into());
        }

        let dispatch_id = DispatchId::new();
        let recipients = self.session.resolve(self.catalog.population())?;
        if recipients.is_empty() {
            tracing::warn!(dispatch_id = %dispatch_id, "No recipients resolved");
            return Err(ValidationFailure::EmptyRecipients.into());
        }

        tracing::info!(
            dispatch_id = %dispatch_id,
            recipients = recipients.len(),
            population = self.catalog.population().len(),
            "Dispatch started"
        );

        let resources = self
            .uploader
            .upload_all(self.session.attachment(), self.session.signature())
            .await?;

        let receipt = self
            .submitter
            .submit(
                dispatch_id,
                self.session.mode(),
                recipients,
                &self.session.draft,
                resources,
                Some(self.effective_sender()),
            )
            .await?;

        self.tracker = Some(QueueTracker::spawn(
            self.api.clone(),
            self.schedule,
            dispatch_id,
        ));
        self.session.reset_after_dispatch();

        Ok(DispatchAccepted {
            dispatch_id,
            receipt,
        })
    }

    /// Next event from the current tracker, `None` when nothing is tracked.
    pub async fn next_event(&mut self) -> Option<PollEvent> {
        match self.tracker.as_mut() {
            Some(tracker) => tracker.next_event().await,
            None => None,
        }
    }

    /// Wait for the current tracking cycle to end, `None` when nothing is
    /// tracked. The tracker stays owned by the controller until it has ended,
    /// so an abandoned wait keeps the in-flight guard up.
    pub async fn wait_tracking(&mut self) -> Option<Result<PollOutcome, AppError>> {
        let tracker = self.tracker.as_mut()?;
        let outcome = tracker.wait().await;
        self.tracker = None;
        Some(outcome)
    }

    /// Stop following the queue. The guard drops once the task has wound down.
    pub fn cancel_tracking(&self) {
        if let Some(tracker) = &self.tracker {
            tracing::info!(dispatch_id = %tracker.dispatch_id(), "Tracking cancelled by operator");
            tracker.cancel();
        }
    }
}
