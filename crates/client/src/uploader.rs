//! Resource uploads.
//!
//! Files are checked locally first, so an unsupported or empty file never
//! costs a round trip. Uploads run one at a time, attachment first.

use std::sync::Arc;

use cardmail_common::error::{AppError, ValidationFailure};
use cardmail_common::types::{Resource, StorageRef};
use cardmail_engine::job::UploadedResources;

use crate::api::CardscanApi;

pub struct ResourceUploader {
    api: Arc<dyn CardscanApi>,
}

impl ResourceUploader {
    pub fn new(api: Arc<dyn CardscanApi>) -> Self {
        Self { api }
    }

    /// Reject empty files and extensions outside the kind's allow-list.
    pub fn validate(resource: &Resource) -> Result<(), ValidationFailure> {
        let allowed = resource
            .extension()
            .is_some_and(|ext| resource.kind.allowed_extensions().contains(&ext.as_str()));
        if !allowed {
            return Err(ValidationFailure::UnsupportedFileType {
                kind: resource.kind,
                file_name: resource.file_name.clone(),
            });
        }

        if resource.bytes.is_empty() {
            return Err(ValidationFailure::EmptyResource {
                kind: resource.kind,
                file_name: resource.file_name.clone(),
            });
        }

        Ok(())
    }

    pub async fn upload(&self, resource: &Resource) -> Result<StorageRef, AppError> {
        Self::validate(resource)?;

        let reference = self
            .api
            .upload_resource(resource)
            .await
            .map_err(|cause| AppError::Upload {
                kind: resource.kind,
                cause,
            })?;

        tracing::info!(
            kind = %resource.kind,
            file_name = %resource.file_name,
            reference = %reference,
            "Resource uploaded"
        );
        Ok(reference)
    }

    /// Upload whatever is staged. Both files are validated before either is
    /// sent; the first failed upload aborts the rest.
    pub async fn upload_all(
        &self,
        attachment: Option<&Resource>,
        signature: Option<&Resource>,
    ) -> Result<UploadedResources, AppError> {
        for resource in attachment.iter().chain(signature.iter()) {
            Self::validate(resource)?;
        }

        let mut uploaded = UploadedResources::default();
        if let Some(resource) = attachment {
            uploaded.attachment = Some(self.upload(resource).await?);
        }
        if let Some(resource) = signature {
            uploaded.signature = Some(self.upload(resource).await?);
        }
        Ok(uploaded)
    }
}
