use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;

use cardmail_common::config::AppConfig;
use cardmail_common::error::ApiError;
use cardmail_common::types::{
    Batch, ContactRecord, DispatchRequest, EventSummary, QueueStatus, Resource, SearchKind,
    SearchRecord, StorageRef, SubmissionReceipt,
};

use super::{
    BatchesEnvelope, CardscanApi, ContactsEnvelope, ErrorEnvelope, EventsEnvelope,
    NamesEnvelope, SearchEnvelope, UploadEnvelope,
};

/// Production client for the card-scan backend.
#[derive(Clone)]
pub struct ReqwestApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.request_timeout())
    }

    /// `{base}/api/v1/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }
}

/// Decode a success body, or turn an error status into `ApiError::Rejected`
/// carrying the server's `detail` when present.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.detail)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.clone()
                }
            });
        tracing::warn!(status = status.as_u16(), detail = %detail, "Backend rejected request");
        return Err(ApiError::rejected(status.as_u16(), detail));
    }

    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl CardscanApi for ReqwestApiClient {
    #[tracing::instrument(skip(self))]
    async fn list_batches(&self) -> Result<Vec<Batch>, ApiError> {
        let envelope: BatchesEnvelope = self.get_json(&["saved-batches"]).await?;
        Ok(envelope.batches)
    }

    #[tracing::instrument(skip(self))]
    async fn list_names(&self) -> Result<Vec<String>, ApiError> {
        let envelope: NamesEnvelope = self.get_json(&["names"]).await?;
        Ok(envelope.names)
    }

    #[tracing::instrument(skip(self))]
    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ApiError> {
        let envelope: ContactsEnvelope = self.get_json(&["contacts"]).await?;
        Ok(envelope.contacts)
    }

    #[tracing::instrument(skip(self))]
    async fn contacts_by_batch(&self, batch_id: &str) -> Result<Vec<ContactRecord>, ApiError> {
        let envelope: ContactsEnvelope =
            self.get_json(&["contacts", "by-batch", batch_id]).await?;
        Ok(envelope.contacts)
    }

    #[tracing::instrument(skip(self))]
    async fn events_by_name(&self, name: &str) -> Result<Vec<EventSummary>, ApiError> {
        let envelope: EventsEnvelope = self.get_json(&["events", name]).await?;
        Ok(envelope.events)
    }

    #[tracing::instrument(skip(self))]
    async fn search_records(
        &self,
        kind: SearchKind,
        term: &str,
    ) -> Result<Vec<SearchRecord>, ApiError> {
        let url = self.endpoint(&["search-records"])?;
        let response = self
            .client
            .get(url)
            .query(&[("search_type", kind.to_string().as_str()), ("search_term", term)])
            .send()
            .await?;
        let envelope: SearchEnvelope = read_json(response).await?;
        Ok(envelope.records)
    }

    #[tracing::instrument(skip_all, fields(kind = %resource.kind, file_name = %resource.file_name, size = resource.bytes.len()))]
    async fn upload_resource(&self, resource: &Resource) -> Result<StorageRef, ApiError> {
        let mut part = reqwest::multipart::Part::bytes(resource.bytes.clone())
            .file_name(resource.file_name.clone());
        if let Some(content_type) = &resource.content_type {
            part = part.mime_str(content_type)?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload-attachment"])?;
        let response = self.client.post(url).multipart(form).send().await?;
        let envelope: UploadEnvelope = read_json(response).await?;

        tracing::debug!(file_path = %envelope.file_path, "Resource stored");
        Ok(envelope.file_path)
    }

    #[tracing::instrument(skip_all, fields(recipients = request.recipients.len()))]
    async fn submit_dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<SubmissionReceipt, ApiError> {
        let url = self.endpoint(&["send-emails"])?;
        let response = self.client.post(url).json(request).send().await?;
        read_json(response).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        self.get_json(&["queue-status"]).await
    }
}
