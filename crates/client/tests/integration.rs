//! Integration tests for the HTTP client and the dispatch lifecycle.
//!
//! Each test starts an in-process axum server that mimics the card-scan
//! backend on an ephemeral port and drives it through `ReqwestApiClient`.
//!
//! ```bash
//! cargo test -p cardmail-client --test integration -- --nocapture
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Datelike;
use parking_lot::Mutex;
use serde_json::{Value, json};

use cardmail_client::api::{CardscanApi, ReqwestApiClient};
use cardmail_client::controller::DispatchController;
use cardmail_client::tracker::{PollEvent, QueueTracker};
use cardmail_common::error::{ApiError, AppError};
use cardmail_common::types::{
    CanonicalEmail, DispatchId, Resource, ResourceKind, SearchFilter, SelectionMode,
};
use cardmail_engine::job::MessageDraft;
use cardmail_engine::poller::{PollOutcome, PollSchedule};

// ============================================================
// Fake backend
// ============================================================

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

#[derive(Default)]
struct Recorded {
    uploads: Vec<(String, String, usize)>,
    submissions: Vec<Value>,
    searches: Vec<HashMap<String, String>>,
    statuses: VecDeque<Value>,
    reject_uploads: bool,
    reject_submit: Option<String>,
    status_down: bool,
}

#[derive(Clone, Default)]
struct Backend {
    inner: Arc<Mutex<Recorded>>,
}

fn rejected(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

fn contacts() -> Value {
    json!([
        { "name": "Ann Lee", "email": "Ann@X.com", "company": "Acme" },
        { "name": "", "email": "bob@x.com, bob.alt@x.com", "phone": "555" },
        { "name": "Cara", "email": "not-an-email" },
        { "name": "Ann Again", "email": "ann@x.com" },
        { "name": null, "email": null, "phone": null, "company": null }
    ])
}

fn router(backend: Backend) -> Router {
    Router::new()
        .route("/api/v1/names", get(names))
        .route("/api/v1/contacts", get(all_contacts))
        .route("/api/v1/contacts/by-batch/{batch_id}", get(batch_contacts))
        .route("/api/v1/events/{name}", get(events))
        .route("/api/v1/saved-batches", get(saved_batches))
        .route("/api/v1/search-records", get(search_records))
        .route("/api/v1/upload-attachment", post(upload_attachment))
        .route("/api/v1/send-emails", post(send_emails))
        .route("/api/v1/queue-status", get(queue_status))
        .with_state(backend)
}

async fn names() -> Json<Value> {
    Json(json!({ "names": ["Ravi K", "Meera"] }))
}

async fn all_contacts() -> Json<Value> {
    Json(json!({ "contacts": contacts() }))
}

async fn batch_contacts(Path(batch_id): Path<String>) -> Reply {
    match batch_id.as_str() {
        "7" => Ok(Json(json!({
            "contacts": [
                { "name": "", "email": "bob@x.com" },
                { "name": "Dev", "email": "dev@x.com" }
            ]
        }))),
        _ => Err(rejected(StatusCode::NOT_FOUND, "Batch not found")),
    }
}

async fn events(Path(name): Path<String>) -> Json<Value> {
    let events = if name == "Ravi K" {
        json!([
            { "batch_id": "7", "event_name": "Expo 2024", "team": "Sales" },
            { "batch_id": "8", "event_name": null, "team": null }
        ])
    } else {
        json!([])
    };
    Json(json!({ "events": events }))
}

async fn saved_batches() -> Json<Value> {
    Json(json!({
        "batches": [
            {
                "batch_id": "7",
                "name": "Ravi K",
                "team": "Sales",
                "event": "Expo 2024",
                "created_at": "2024-03-05T10:15:00",
                "total_records": 2
            }
        ]
    }))
}

async fn search_records(
    State(backend): State<Backend>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    backend.inner.lock().searches.push(params);
    Json(json!({
        "records": [
            { "card_name": "Ann Lee", "email": "ann@x.com", "form_name": "Ravi K", "team": "Sales", "event": "Expo 2024" },
            { "card_name": "Dev", "email": "dev@x.com", "form_name": "Ravi K", "team": "Marketing", "event": "Summit" },
            { "card_name": null, "phone": null, "email": "pat@x.com", "company": null, "form_name": "Ravi K", "team": null, "event": "Expo 2024", "image_data": null }
        ]
    }))
}

async fn upload_attachment(State(backend): State<Backend>, mut multipart: Multipart) -> Reply {
    if backend.inner.lock().reject_uploads {
        return Err(rejected(StatusCode::BAD_REQUEST, "File type not supported"));
    }

    let mut stored = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|_| {
            rejected(StatusCode::BAD_REQUEST, "Unreadable upload")
        })?;
        backend
            .inner
            .lock()
            .uploads
            .push((name, file_name.clone(), bytes.len()));
        stored = Some(file_name);
    }

    match stored {
        Some(file_name) => Ok(Json(json!({
            "message": "File uploaded successfully",
            "filename": file_name,
            "file_path": format!("./attachments/{file_name}"),
        }))),
        None => Err(rejected(StatusCode::UNPROCESSABLE_ENTITY, "file is required")),
    }
}

async fn send_emails(State(backend): State<Backend>, Json(body): Json<Value>) -> Reply {
    let mut inner = backend.inner.lock();
    if let Some(detail) = inner.reject_submit.clone() {
        return Err(rejected(StatusCode::INTERNAL_SERVER_ERROR, &detail));
    }

    let count = body["recipients"].as_array().map_or(0, |r| r.len());
    inner.submissions.push(body);
    Ok(Json(json!({
        "message": format!("Added {count} emails to queue"),
        "batch_id": "queue-1",
        "count": count,
        "status": "processing_started"
    })))
}

async fn queue_status(State(backend): State<Backend>) -> Reply {
    let mut inner = backend.inner.lock();
    if inner.status_down {
        return Err(rejected(StatusCode::INTERNAL_SERVER_ERROR, "Error: queue offline"));
    }
    Ok(Json(inner.statuses.pop_front().unwrap_or_else(|| {
        json!({ "processing": false, "queued": 0, "sent": 0, "failed": 0, "total": 0 })
    })))
}

// ============================================================
// Helpers
// ============================================================

async fn start(backend: Backend) -> ReqwestApiClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(backend)).await.unwrap();
    });
    ReqwestApiClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
}

fn fast_schedule() -> PollSchedule {
    PollSchedule {
        initial_delay: Duration::from_millis(20),
        interval: Duration::from_millis(20),
        max_retries: 2,
        retry_backoff: Duration::from_millis(10),
    }
}

fn controller(client: ReqwestApiClient) -> DispatchController {
    DispatchController::with_schedule(Arc::new(client), fast_schedule(), "Team Member")
}

// ============================================================
// Catalog
// ============================================================

#[tokio::test]
async fn test_catalog_reads_and_decodes() {
    let client = start(Backend::default()).await;

    let names = client.list_names().await.unwrap();
    assert_eq!(names, vec!["Ravi K", "Meera"]);

    let contacts = client.list_contacts().await.unwrap();
    assert_eq!(contacts.len(), 5);
    assert_eq!(contacts[1].phone, "555");
    assert_eq!(contacts[2].company, "");

    let batches = client.list_batches().await.unwrap();
    assert_eq!(batches[0].total_records, 2);
    assert_eq!(batches[0].created_at.map(|ts| ts.year()), Some(2024));

    // Name with a space travels percent-encoded and arrives intact
    let events = client.events_by_name("Ravi K").await.unwrap();
    assert_eq!(events[0].event_name, "Expo 2024");
}

#[tokio::test]
async fn test_error_status_carries_detail() {
    let client = start(Backend::default()).await;
    match client.contacts_by_batch("999").await {
        Err(ApiError::Rejected { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail, "Batch not found");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_search_sends_primary_only() {
    let backend = Backend::default();
    let client = start(backend.clone()).await;
    let mut controller = controller(client);

    let found = controller
        .catalog_mut()
        .search(&SearchFilter::by_name_and_team("Ravi K", "sales"))
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Ann Lee");

    let searches = backend.inner.lock().searches.clone();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].get("search_type").map(String::as_str), Some("name"));
    assert_eq!(searches[0].get("search_term").map(String::as_str), Some("Ravi K"));
}

#[tokio::test]
async fn test_messy_population_still_loads() {
    let mut controller = controller(start(Backend::default()).await);

    controller.catalog_mut().load().await.unwrap();
    assert_eq!(controller.catalog().population().len(), 5);

    controller.catalog_mut().select_name(Some("Ravi K")).await.unwrap();
    let events = controller.catalog().events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_name, "");
    assert_eq!(events[1].team, "");

    let found = controller
        .catalog()
        .search(&SearchFilter::by_name("Ravi K"))
        .await
        .unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(found[2].phone, "");
    assert_eq!(found[2].contact().display_name(), "Business Partner");

    // Invalid and missing emails drop out of the audience
    controller.session_mut().set_mode(SelectionMode::All);
    let preview = controller.preview().unwrap();
    let emails: Vec<String> = preview
        .recipients
        .iter()
        .map(|r| r.email.to_string())
        .collect();
    assert_eq!(emails, vec!["ann@x.com", "bob@x.com"]);
}

// ============================================================
// Dispatch lifecycle
// ============================================================

#[tokio::test]
async fn test_full_dispatch_flow() {
    let backend = Backend::default();
    {
        let mut inner = backend.inner.lock();
        inner
            .statuses
            .push_back(json!({ "processing": true, "queued": 1, "sent": 1, "failed": 0, "total": 2 }));
        inner
            .statuses
            .push_back(json!({ "processing": false, "queued": 0, "sent": 2, "failed": 0, "total": 2 }));
    }
    let mut controller = controller(start(backend.clone()).await);

    controller.catalog_mut().load().await.unwrap();
    controller.catalog_mut().select_name(Some("Ravi K")).await.unwrap();
    controller.catalog_mut().select_event(Some("7")).await.unwrap();

    let session = controller.session_mut();
    session.draft = MessageDraft::new("Great meeting you", "Hi [Recipient Name],\n[Sender Name]");
    session.set_mode(SelectionMode::Exclude);
    session.toggle(CanonicalEmail::parse("dev@x.com").unwrap());
    session.stage(
        Resource::new(ResourceKind::Attachment, "deck.pdf", b"%PDF-1.4".to_vec())
            .with_content_type("application/pdf"),
    );
    session.stage(Resource::new(ResourceKind::Signature, "sig.png", vec![0x89, 0x50, 0x4e, 0x47]));

    let accepted = controller.dispatch().await.unwrap();
    assert_eq!(accepted.receipt.count, 1);
    assert_eq!(accepted.receipt.batch_id.as_deref(), Some("queue-1"));

    let mut events = Vec::new();
    while let Some(event) = controller.next_event().await {
        let done = matches!(event, PollEvent::Finished(_));
        events.push(event);
        if done {
            break;
        }
    }
    assert_eq!(
        events.last(),
        Some(&PollEvent::Finished(PollOutcome::Completed { sent: 2, failed: 0 }))
    );
    assert!(matches!(events[0], PollEvent::Progress(_)));

    let inner = backend.inner.lock();
    assert_eq!(
        inner.uploads,
        vec![
            ("file".to_string(), "deck.pdf".to_string(), 8),
            ("file".to_string(), "sig.png".to_string(), 4),
        ]
    );
    assert_eq!(inner.submissions.len(), 1);
    assert_eq!(
        inner.submissions[0],
        json!({
            "recipients": [{ "email": "bob@x.com", "name": "Business Partner" }],
            "subject": "Great meeting you",
            "body": "Hi [Recipient Name],\nRavi K",
            "attachment_path": "./attachments/deck.pdf",
            "signature_path": "./attachments/sig.png"
        })
    );
}

#[tokio::test]
async fn test_all_mode_dedupes_and_skips_invalid() {
    let backend = Backend::default();
    let mut controller = controller(start(backend.clone()).await);
    controller.catalog_mut().load().await.unwrap();
    controller.session_mut().set_mode(SelectionMode::All);

    controller.dispatch().await.unwrap();

    let inner = backend.inner.lock();
    assert_eq!(
        inner.submissions[0]["recipients"],
        json!([
            { "email": "ann@x.com", "name": "Ann Lee" },
            { "email": "bob@x.com", "name": "Business Partner" }
        ])
    );
    assert_eq!(inner.submissions[0]["attachment_path"], Value::Null);
}

#[tokio::test]
async fn test_rejected_submit_surfaces_detail() {
    let backend = Backend::default();
    backend.inner.lock().reject_submit = Some("Error: SMTP not configured".to_string());
    let mut controller = controller(start(backend.clone()).await);
    controller.catalog_mut().load().await.unwrap();
    controller.session_mut().set_mode(SelectionMode::All);

    let err = controller.dispatch().await.unwrap_err();
    assert_eq!(err.to_string(), "Dispatch failed: Error: SMTP not configured");
    assert!(!controller.is_dispatching());
    assert!(controller.wait_tracking().await.is_none());
}

#[tokio::test]
async fn test_rejected_upload_stops_before_submit() {
    let backend = Backend::default();
    backend.inner.lock().reject_uploads = true;
    let mut controller = controller(start(backend.clone()).await);
    controller.catalog_mut().load().await.unwrap();
    controller.session_mut().set_mode(SelectionMode::All);
    controller
        .session_mut()
        .stage(Resource::new(ResourceKind::Attachment, "notes.doc", vec![1, 2]));

    match controller.dispatch().await {
        Err(AppError::Upload { kind, cause }) => {
            assert_eq!(kind, ResourceKind::Attachment);
            assert_eq!(cause.detail(), "File type not supported");
        }
        other => panic!("expected upload failure, got {:?}", other),
    }
    assert!(backend.inner.lock().submissions.is_empty());
}

#[tokio::test]
async fn test_status_outage_exhausts_retries() {
    let backend = Backend::default();
    backend.inner.lock().status_down = true;
    let client = start(backend).await;

    let mut handle = QueueTracker::spawn(Arc::new(client), fast_schedule(), DispatchId::new());
    match handle.wait().await {
        Err(AppError::Poll { attempts, cause }) => {
            assert_eq!(attempts, 3);
            assert_eq!(cause.detail(), "Error: queue offline");
        }
        other => panic!("expected poll failure, got {:?}", other),
    }
}
