//! Command implementations.

mod catalog;
mod send;
mod status;

pub use catalog::{run_batches, run_contacts, run_events, run_names, run_search};
pub use send::run_send;
pub use status::run_status;

use anyhow::{Context, Result};
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Placeholder for blank columns.
fn or_dash(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() { "-" } else { value }
}
