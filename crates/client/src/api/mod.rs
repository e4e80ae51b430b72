//! Card-scan backend API.
//!
//! `CardscanApi` abstracts every round trip the dispatch lifecycle makes, so
//! the catalog, uploader, submitter, and tracker can run against the real
//! backend (`ReqwestApiClient`) or a scripted one (`MockCardscanApi`).

mod http;
mod mock;

pub use http::ReqwestApiClient;
pub use mock::{MockCall, MockCardscanApi};

use async_trait::async_trait;
use serde::Deserialize;

use cardmail_common::error::ApiError;
use cardmail_common::types::{
    Batch, ContactRecord, DispatchRequest, EventSummary, QueueStatus, Resource, SearchKind,
    SearchRecord, StorageRef, SubmissionReceipt,
};

#[async_trait]
pub trait CardscanApi: Send + Sync {
    async fn list_batches(&self) -> Result<Vec<Batch>, ApiError>;

    async fn list_names(&self) -> Result<Vec<String>, ApiError>;

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ApiError>;

    async fn contacts_by_batch(&self, batch_id: &str) -> Result<Vec<ContactRecord>, ApiError>;

    async fn events_by_name(&self, name: &str) -> Result<Vec<EventSummary>, ApiError>;

    /// Server-side search on one term; secondary constraints are applied by the caller.
    async fn search_records(
        &self,
        kind: SearchKind,
        term: &str,
    ) -> Result<Vec<SearchRecord>, ApiError>;

    /// Upload one binary resource as multipart field `file`.
    async fn upload_resource(&self, resource: &Resource) -> Result<StorageRef, ApiError>;

    /// Submit a whole dispatch job in one request.
    async fn submit_dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<SubmissionReceipt, ApiError>;

    async fn queue_status(&self) -> Result<QueueStatus, ApiError>;
}

#[derive(Debug, Deserialize)]
struct BatchesEnvelope {
    #[serde(default)]
    batches: Vec<Batch>,
}

#[derive(Debug, Deserialize)]
struct NamesEnvelope {
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ContactsEnvelope {
    #[serde(default)]
    contacts: Vec<ContactRecord>,
}

#[derive(Debug, Deserialize)]
struct EventsEnvelope {
    #[serde(default)]
    events: Vec<EventSummary>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    records: Vec<SearchRecord>,
}

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    file_path: StorageRef,
}

/// Error body the backend returns on failure.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: String,
}
