//! Read-only catalog commands: `batches`, `names`, `contacts`, `events`, `search`.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use cardmail_client::api::CardscanApi;
use cardmail_client::catalog::ContactCatalog;
use cardmail_common::types::{ContactRecord, SearchRecord};

use super::{or_dash, print_json};
use crate::cli::{ContactsArgs, EventsArgs, OutputArgs, SearchArgs};

pub async fn run_batches(api: Arc<dyn CardscanApi>, args: &OutputArgs) -> Result<()> {
    let batches = ContactCatalog::new(api).batches().await?;
    info!(count = batches.len(), "Batches fetched");

    if args.json {
        return print_json(&batches);
    }
    for batch in &batches {
        let created = batch
            .created_at
            .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}\t{}\t{}\t{}\t{} records\t{}",
            or_dash(&batch.batch_id),
            or_dash(&batch.name),
            or_dash(&batch.team),
            or_dash(&batch.event),
            batch.total_records,
            created
        );
    }
    Ok(())
}

pub async fn run_names(api: Arc<dyn CardscanApi>, args: &OutputArgs) -> Result<()> {
    let mut catalog = ContactCatalog::new(api);
    catalog.load().await?;

    if args.json {
        return print_json(catalog.names());
    }
    for name in catalog.names() {
        println!("{}", name);
    }
    Ok(())
}

pub async fn run_contacts(api: Arc<dyn CardscanApi>, args: &ContactsArgs) -> Result<()> {
    let mut catalog = ContactCatalog::new(api);
    let contacts = match &args.batch {
        Some(batch_id) => catalog.batch_contacts(batch_id).await?,
        None => {
            catalog.load().await?;
            catalog.all_contacts().to_vec()
        }
    };
    info!(count = contacts.len(), batch = args.batch.as_deref(), "Contacts fetched");

    if args.output.json {
        return print_json(&contacts);
    }
    print_contacts(&contacts);
    Ok(())
}

pub async fn run_events(api: Arc<dyn CardscanApi>, args: &EventsArgs) -> Result<()> {
    let mut catalog = ContactCatalog::new(api);
    catalog.select_name(Some(&args.name)).await?;

    if args.output.json {
        return print_json(catalog.events());
    }
    if catalog.events().is_empty() {
        println!("No events recorded under '{}'", args.name);
    }
    for event in catalog.events() {
        println!(
            "{}\t{}\t{}",
            event.batch_id,
            or_dash(&event.event_name),
            or_dash(&event.team)
        );
    }
    Ok(())
}

pub async fn run_search(api: Arc<dyn CardscanApi>, args: &SearchArgs) -> Result<()> {
    let filter = args.filter()?;
    let records = ContactCatalog::new(api).search(&filter).await?;
    info!(
        kind = %filter.kind,
        primary = %filter.primary,
        matches = records.len(),
        "Search finished"
    );

    if args.output.json {
        return print_json(&records);
    }
    print_search_records(&records);
    Ok(())
}

fn print_contacts(contacts: &[ContactRecord]) {
    for contact in contacts {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            contact.display_name(),
            or_dash(&contact.email),
            or_dash(&contact.phone),
            or_dash(&contact.company),
            or_dash(&contact.designation)
        );
    }
    println!("{} contacts", contacts.len());
}

fn print_search_records(records: &[SearchRecord]) {
    for record in records {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            record.contact().display_name(),
            or_dash(&record.email),
            or_dash(&record.company),
            or_dash(&record.team),
            or_dash(&record.event)
        );
    }
    println!("{} records", records.len());
}
