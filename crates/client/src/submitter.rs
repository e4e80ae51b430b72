//! Dispatch submission.
//!
//! One call, one POST. Nothing is sent unless a selection mode is set and
//! the resolved recipient set is non-empty.

use std::sync::Arc;

use cardmail_common::error::{AppError, ValidationFailure};
use cardmail_common::types::{DispatchId, RecipientSet, SelectionMode, SubmissionReceipt};
use cardmail_engine::job::{DispatchJob, MessageDraft, UploadedResources};

use crate::api::CardscanApi;

pub struct DispatchSubmitter {
    api: Arc<dyn CardscanApi>,
    default_sender: String,
}

impl DispatchSubmitter {
    pub fn new(api: Arc<dyn CardscanApi>, default_sender: impl Into<String>) -> Self {
        Self {
            api,
            default_sender: default_sender.into(),
        }
    }

    pub fn default_sender(&self) -> &str {
        &self.default_sender
    }

    /// Explicit sender if non-blank, else the configured default.
    pub fn sender_or_default<'a>(&'a self, sender: Option<&'a str>) -> &'a str {
        sender
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_sender.as_str())
    }

    /// Build the job and submit it in a single request.
    pub async fn submit(
        &self,
        dispatch_id: DispatchId,
        mode: Option<SelectionMode>,
        recipients: RecipientSet,
        draft: &MessageDraft,
        resources: UploadedResources,
        sender: Option<&str>,
    ) -> Result<SubmissionReceipt, AppError> {
        let mode = mode.ok_or(ValidationFailure::NoSelectionMode)?;
        let sender = self.sender_or_default(sender);
        let job = DispatchJob::build(recipients, draft, resources, sender)?;
        let recipients = job.recipients().len();

        tracing::info!(
            dispatch_id = %dispatch_id,
            mode = %mode,
            recipients,
            attachment = job.attachment_ref().is_some(),
            signature = job.signature_ref().is_some(),
            "Submitting dispatch"
        );

        let request = job.into_request();
        let receipt = self
            .api
            .submit_dispatch(&request)
            .await
            .map_err(|e| {
                tracing::error!(dispatch_id = %dispatch_id, error = %e, "Dispatch rejected");
                AppError::Dispatch(e)
            })?;

        tracing::info!(
            dispatch_id = %dispatch_id,
            count = receipt.count,
            batch_id = receipt.batch_id.as_deref().unwrap_or("-"),
            "Dispatch accepted"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockCardscanApi;
    use cardmail_common::error::ApiError;
    use cardmail_common::types::{CanonicalEmail, StorageRef};

    fn recipients(emails: &[&str]) -> RecipientSet {
        let mut set = RecipientSet::new();
        for raw in emails {
            set.insert(CanonicalEmail::parse(raw).unwrap(), "Ann".to_string());
        }
        set
    }

    fn draft() -> MessageDraft {
        MessageDraft::new("Hello", "Regards,\n[Sender Name]\n[Sender Name]")
    }

    fn submitter(mock: &MockCardscanApi) -> DispatchSubmitter {
        DispatchSubmitter::new(Arc::new(mock.clone()), "Team Member")
    }

    #[tokio::test]
    async fn test_empty_recipients_makes_no_call() {
        let mock = MockCardscanApi::new();
        let err = submitter(&mock)
            .submit(
                DispatchId::new(),
                Some(SelectionMode::Include),
                RecipientSet::new(),
                &draft(),
                UploadedResources::default(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationFailure::EmptyRecipients)
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_mode_makes_no_call() {
        let mock = MockCardscanApi::new();
        let err = submitter(&mock)
            .submit(
                DispatchId::new(),
                None,
                recipients(&["a@x.com"]),
                &draft(),
                UploadedResources::default(),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::Validation(ValidationFailure::NoSelectionMode)
        ));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_sends_one_request() {
        let mock = MockCardscanApi::new();
        let resources = UploadedResources {
            attachment: Some(StorageRef("./attachments/deck.pdf".to_string())),
            signature: None,
        };

        let receipt = submitter(&mock)
            .submit(
                DispatchId::new(),
                Some(SelectionMode::All),
                recipients(&["a@x.com", "b@x.com"]),
                &draft(),
                resources,
                Some("Ravi"),
            )
            .await
            .unwrap();

        assert_eq!(receipt.count, 2);
        let sent = mock.submissions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].body, "Regards,\nRavi\nRavi");
        assert_eq!(
            sent[0].attachment_path,
            Some(StorageRef("./attachments/deck.pdf".to_string()))
        );
        assert_eq!(sent[0].signature_path, None);
    }

    #[tokio::test]
    async fn test_blank_sender_falls_back_to_default() {
        let mock = MockCardscanApi::new();
        submitter(&mock)
            .submit(
                DispatchId::new(),
                Some(SelectionMode::All),
                recipients(&["a@x.com"]),
                &draft(),
                UploadedResources::default(),
                Some("   "),
            )
            .await
            .unwrap();

        assert_eq!(mock.submissions()[0].body, "Regards,\nTeam Member\nTeam Member");
    }

    #[tokio::test]
    async fn test_rejection_surfaces_detail() {
        let mock = MockCardscanApi::new();
        mock.push_submission(Err(ApiError::rejected(500, "SMTP credentials missing")));

        let err = submitter(&mock)
            .submit(
                DispatchId::new(),
                Some(SelectionMode::All),
                recipients(&["a@x.com"]),
                &draft(),
                UploadedResources::default(),
                None,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Dispatch failed: SMTP credentials missing");
    }
}
