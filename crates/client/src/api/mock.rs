use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use cardmail_common::error::ApiError;
use cardmail_common::types::{
    Batch, ContactRecord, DispatchRequest, EventSummary, QueueStatus, Resource, ResourceKind,
    SearchKind, SearchRecord, StorageRef, SubmissionReceipt,
};

use super::CardscanApi;

/// Record of a call made to the mock backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    ListBatches,
    ListNames,
    ListContacts,
    ContactsByBatch(String),
    EventsByName(String),
    SearchRecords { kind: SearchKind, term: String },
    Upload { kind: ResourceKind, file_name: String },
    Submit(DispatchRequest),
    QueueStatus,
}

#[derive(Default)]
struct MockState {
    batches: Vec<Batch>,
    names: Vec<String>,
    contacts: Vec<ContactRecord>,
    by_batch: HashMap<String, Vec<ContactRecord>>,
    events: HashMap<String, Vec<EventSummary>>,
    search: Vec<SearchRecord>,
    uploads: VecDeque<Result<StorageRef, ApiError>>,
    submissions: VecDeque<Result<SubmissionReceipt, ApiError>>,
    statuses: VecDeque<Result<QueueStatus, ApiError>>,
    calls: Vec<MockCall>,
}

/// In-memory backend for tests.
///
/// Catalog data is fixed; upload, submit, and status responses are scripted
/// and consumed in FIFO order. Unscripted uploads and submissions succeed,
/// unscripted status reads fail with a 503.
#[derive(Clone, Default)]
pub struct MockCardscanApi {
    state: Arc<Mutex<MockState>>,
}

impl MockCardscanApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contacts(self, contacts: Vec<ContactRecord>) -> Self {
        self.state.lock().contacts = contacts;
        self
    }

    pub fn with_names(self, names: Vec<String>) -> Self {
        self.state.lock().names = names;
        self
    }

    pub fn with_batches(self, batches: Vec<Batch>) -> Self {
        self.state.lock().batches = batches;
        self
    }

    pub fn with_batch_contacts(self, batch_id: &str, contacts: Vec<ContactRecord>) -> Self {
        self.state
            .lock()
            .by_batch
            .insert(batch_id.to_string(), contacts);
        self
    }

    pub fn with_events(self, name: &str, events: Vec<EventSummary>) -> Self {
        self.state.lock().events.insert(name.to_string(), events);
        self
    }

    pub fn with_search_records(self, records: Vec<SearchRecord>) -> Self {
        self.state.lock().search = records;
        self
    }

    pub fn push_upload(&self, response: Result<StorageRef, ApiError>) {
        self.state.lock().uploads.push_back(response);
    }

    pub fn push_submission(&self, response: Result<SubmissionReceipt, ApiError>) {
        self.state.lock().submissions.push_back(response);
    }

    pub fn push_status(&self, response: Result<QueueStatus, ApiError>) {
        self.state.lock().statuses.push_back(response);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Submissions received so far.
    pub fn submissions(&self) -> Vec<DispatchRequest> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Submit(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl CardscanApi for MockCardscanApi {
    async fn list_batches(&self) -> Result<Vec<Batch>, ApiError> {
        self.record(MockCall::ListBatches);
        Ok(self.state.lock().batches.clone())
    }

    async fn list_names(&self) -> Result<Vec<String>, ApiError> {
        self.record(MockCall::ListNames);
        Ok(self.state.lock().names.clone())
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, ApiError> {
        self.record(MockCall::ListContacts);
        Ok(self.state.lock().contacts.clone())
    }

    async fn contacts_by_batch(&self, batch_id: &str) -> Result<Vec<ContactRecord>, ApiError> {
        self.record(MockCall::ContactsByBatch(batch_id.to_string()));
        Ok(self
            .state
            .lock()
            .by_batch
            .get(batch_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn events_by_name(&self, name: &str) -> Result<Vec<EventSummary>, ApiError> {
        self.record(MockCall::EventsByName(name.to_string()));
        Ok(self
            .state
            .lock()
            .events
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    async fn search_records(
        &self,
        kind: SearchKind,
        term: &str,
    ) -> Result<Vec<SearchRecord>, ApiError> {
        self.record(MockCall::SearchRecords {
            kind,
            term: term.to_string(),
        });
        let needle = term.to_lowercase();
        Ok(self
            .state
            .lock()
            .search
            .iter()
            .filter(|r| r.form_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn upload_resource(&self, resource: &Resource) -> Result<StorageRef, ApiError> {
        self.record(MockCall::Upload {
            kind: resource.kind,
            file_name: resource.file_name.clone(),
        });
        let scripted = self.state.lock().uploads.pop_front();
        scripted.unwrap_or_else(|| Ok(StorageRef(format!("./attachments/{}", resource.file_name))))
    }

    async fn submit_dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<SubmissionReceipt, ApiError> {
        self.record(MockCall::Submit(request.clone()));
        let scripted = self.state.lock().submissions.pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SubmissionReceipt {
                count: request.recipients.len() as u64,
                batch_id: None,
                message: None,
            })
        })
    }

    async fn queue_status(&self) -> Result<QueueStatus, ApiError> {
        self.record(MockCall::QueueStatus);
        let scripted = self.state.lock().statuses.pop_front();
        scripted.unwrap_or_else(|| Err(ApiError::rejected(503, "no scripted queue status")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_statuses_fifo() {
        let mock = MockCardscanApi::new();
        mock.push_status(Ok(QueueStatus {
            processing: true,
            queued: 2,
            ..Default::default()
        }));
        mock.push_status(Ok(QueueStatus::default()));

        assert!(mock.queue_status().await.unwrap().processing);
        assert!(!mock.queue_status().await.unwrap().processing);
        assert!(mock.queue_status().await.is_err());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unscripted_upload_succeeds() {
        let mock = MockCardscanApi::new();
        let resource = Resource::new(ResourceKind::Attachment, "deck.pdf", vec![1]);
        let reference = mock.upload_resource(&resource).await.unwrap();
        assert_eq!(reference.0, "./attachments/deck.pdf");
        assert_eq!(
            mock.calls(),
            vec![MockCall::Upload {
                kind: ResourceKind::Attachment,
                file_name: "deck.pdf".to_string()
            }]
        );
    }
}
