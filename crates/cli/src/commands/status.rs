//! `status` command implementation.

use std::sync::Arc;

use anyhow::Result;

use cardmail_client::api::CardscanApi;

use super::print_json;
use crate::cli::OutputArgs;

pub async fn run_status(api: Arc<dyn CardscanApi>, args: &OutputArgs) -> Result<()> {
    let status = api.queue_status().await?;

    if args.json {
        return print_json(&status);
    }
    println!(
        "{}: queued {}, sent {}, failed {}, total {}",
        if status.processing { "processing" } else { "idle" },
        status.queued,
        status.sent,
        status.failed,
        status.total
    );
    Ok(())
}
