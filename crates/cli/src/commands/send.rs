//! `send` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use cardmail_client::api::CardscanApi;
use cardmail_client::controller::{DispatchController, DispatchPreview};
use cardmail_client::tracker::PollEvent;
use cardmail_common::config::AppConfig;
use cardmail_common::types::{CanonicalEmail, Recipient, Resource, ResourceKind, SelectionMode};
use cardmail_engine::poller::PollOutcome;

use super::print_json;
use crate::cli::SendArgs;

/// Dry-run output for JSON
#[derive(Serialize)]
struct PreviewOutput<'a> {
    sender: &'a str,
    subject: &'a str,
    body: &'a str,
    recipients: Vec<&'a Recipient>,
}

pub async fn run_send(
    api: Arc<dyn CardscanApi>,
    config: &AppConfig,
    args: &SendArgs,
) -> Result<()> {
    let mut controller = DispatchController::new(api, config);

    let catalog = controller.catalog_mut();
    catalog.load().await?;
    if let Some(name) = &args.name {
        catalog.select_name(Some(name)).await?;
    }
    if let Some(batch_id) = &args.event {
        catalog.select_event(Some(batch_id)).await?;
    }
    info!(
        name = args.name.as_deref(),
        event = args.event.as_deref(),
        population = controller.catalog().population().len(),
        "Audience filtered"
    );

    let mode = SelectionMode::from(args.mode);
    let session = controller.session_mut();
    if let Some(subject) = &args.subject {
        session.draft.subject = subject.clone();
    }
    if let Some(path) = &args.body_file {
        session.draft.body = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read body from {}", path.display()))?;
    }
    session.sender = args.sender.clone();

    session.set_mode(mode);
    if mode == SelectionMode::All && !args.select.is_empty() {
        warn!(count = args.select.len(), "--select is ignored with --mode all");
    } else {
        for raw in &args.select {
            let email = CanonicalEmail::parse(raw)
                .with_context(|| format!("Not a valid email address: {}", raw))?;
            if !session.is_selected(&email) {
                session.toggle(email);
            }
        }
    }
    session.close_dialog();

    if let Some(path) = &args.attachment {
        session.stage(load_resource(ResourceKind::Attachment, path).await?);
    }
    if let Some(path) = &args.signature {
        session.stage(load_resource(ResourceKind::Signature, path).await?);
    }

    if args.dry_run {
        let preview = controller.preview()?;
        return print_preview(&preview, args.json);
    }

    let accepted = controller.dispatch().await?;
    println!(
        "Queued {} emails{}",
        accepted.receipt.count,
        accepted
            .receipt
            .batch_id
            .as_deref()
            .map(|id| format!(" (queue batch {})", id))
            .unwrap_or_default()
    );

    loop {
        let next = tokio::select! {
            event = controller.next_event() => Some(event),
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(event) = next else {
            info!(dispatch_id = %accepted.dispatch_id, "Received interrupt, cancelling tracking");
            controller.cancel_tracking();
            continue;
        };

        match event {
            Some(PollEvent::Progress(progress)) => println!("{}", progress),
            Some(PollEvent::Retrying { attempt, after, error }) => {
                eprintln!("Queue status unavailable ({}), retry {} in {:?}", error, attempt, after);
            }
            Some(PollEvent::Finished(outcome)) => {
                println!("{}", outcome);
                break;
            }
            None => break,
        }
    }

    let Some(outcome) = controller.wait_tracking().await else {
        return Ok(());
    };
    match outcome? {
        PollOutcome::Completed { failed, .. } if failed > 0 => {
            warn!(failed, "Some emails could not be delivered");
        }
        PollOutcome::Cancelled => {
            println!("Tracking stopped; delivery continues on the server");
        }
        _ => {}
    }
    Ok(())
}

fn print_preview(preview: &DispatchPreview, json: bool) -> Result<()> {
    if json {
        return print_json(&PreviewOutput {
            sender: &preview.sender,
            subject: &preview.subject,
            body: &preview.body,
            recipients: preview.recipients.iter().collect(),
        });
    }

    println!("Sender:  {}", preview.sender);
    println!("Subject: {}", preview.subject);
    println!();
    println!("{}", preview.body);
    println!();
    for recipient in &preview.recipients {
        println!("{}\t{}", recipient.email, recipient.display_name);
    }
    println!("{} recipients (dry run, nothing sent)", preview.recipients.len());
    Ok(())
}

/// Read a file from disk into a resource of the given kind.
async fn load_resource(kind: ResourceKind, path: &Path) -> Result<Resource> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {} from {}", kind, path.display()))?;

    let resource = Resource::new(kind, file_name, bytes);
    Ok(match resource.extension().as_deref().and_then(content_type_for) {
        Some(content_type) => resource.with_content_type(content_type),
        None => resource,
    })
}

fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}
