//! Dispatch job construction.
//!
//! A job is built once, right before submission, and never mutated. Building
//! is where the sender placeholder gets substituted; anything personalized
//! per recipient is left for the delivery queue.

use cardmail_common::error::ValidationFailure;
use cardmail_common::types::{DispatchRequest, RecipientSet, StorageRef};

use crate::template;

/// Message content as the operator composed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDraft {
    pub subject: String,
    pub body: String,
}

impl MessageDraft {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

impl Default for MessageDraft {
    fn default() -> Self {
        Self::new(template::DEFAULT_SUBJECT, template::DEFAULT_BODY)
    }
}

/// References returned by the uploader, each valid for exactly one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadedResources {
    pub attachment: Option<StorageRef>,
    pub signature: Option<StorageRef>,
}

/// One atomic bulk-send request. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchJob {
    subject: String,
    body: String,
    attachment_ref: Option<StorageRef>,
    signature_ref: Option<StorageRef>,
    recipients: RecipientSet,
}

impl DispatchJob {
    /// Build a job, substituting `sender` into the body.
    pub fn build(
        recipients: RecipientSet,
        draft: &MessageDraft,
        resources: UploadedResources,
        sender: &str,
    ) -> Result<Self, ValidationFailure> {
        if recipients.is_empty() {
            return Err(ValidationFailure::EmptyRecipients);
        }

        Ok(Self {
            subject: draft.subject.clone(),
            body: template::apply_sender(&draft.body, sender),
            attachment_ref: resources.attachment,
            signature_ref: resources.signature,
            recipients,
        })
    }

    pub fn recipients(&self) -> &RecipientSet {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachment_ref(&self) -> Option<&StorageRef> {
        self.attachment_ref.as_ref()
    }

    pub fn signature_ref(&self) -> Option<&StorageRef> {
        self.signature_ref.as_ref()
    }

    /// Consume the job into the wire body of the submit endpoint.
    pub fn into_request(self) -> DispatchRequest {
        DispatchRequest {
            recipients: self.recipients,
            subject: self.subject,
            body: self.body,
            attachment_path: self.attachment_ref,
            signature_path: self.signature_ref,
        }
    }
}
