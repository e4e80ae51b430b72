//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use cardmail_common::types::{SearchFilter, SelectionMode};

/// Cardmail - browse captured business cards and mail them in bulk
#[derive(Parser, Debug)]
#[command(
    name = "cardmail",
    author,
    version,
    about = "Browse captured business cards and send follow-up campaigns",
    long_about = "Operator console for the card-scan backend.\n\n\
                  Lists capture batches, names, events, and contacts, searches \n\
                  captured records, and sends a campaign to a selected audience, \n\
                  following the delivery queue until it drains."
)]
pub struct Cli {
    /// Backend base URL (overrides the environment configuration)
    #[arg(long, global = true, env = "CARDSCAN_API_URL")]
    pub api_url: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CARDMAIL_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List capture batches
    Batches(OutputArgs),

    /// List operator names
    Names(OutputArgs),

    /// List contacts, optionally of one batch
    Contacts(ContactsArgs),

    /// List the events recorded under an operator name
    Events(EventsArgs),

    /// Search captured records by operator name
    Search(SearchArgs),

    /// Show the delivery queue status
    Status(OutputArgs),

    /// Send a campaign and follow it to completion
    Send(SendArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct OutputArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ContactsArgs {
    /// Only contacts captured in this batch
    #[arg(long)]
    pub batch: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct EventsArgs {
    /// Operator name
    pub name: String,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Which fields constrain the search
    #[arg(long, value_enum, default_value = "name")]
    pub by: SearchBy,

    /// Operator name to search for
    pub primary: String,

    /// Team or event constraint, required with name-team / name-event
    #[arg(long)]
    pub secondary: Option<String>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl SearchArgs {
    pub fn filter(&self) -> anyhow::Result<SearchFilter> {
        let secondary = || {
            self.secondary
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| anyhow::anyhow!("--secondary is required with --by {:?}", self.by))
        };

        Ok(match self.by {
            SearchBy::Name => SearchFilter::by_name(self.primary.trim()),
            SearchBy::NameTeam => SearchFilter::by_name_and_team(self.primary.trim(), secondary()?),
            SearchBy::NameEvent => {
                SearchFilter::by_name_and_event(self.primary.trim(), secondary()?)
            }
        })
    }
}

#[derive(Parser, Debug, Clone)]
pub struct SendArgs {
    /// Operator name to filter by (also the default sender)
    #[arg(long)]
    pub name: Option<String>,

    /// Batch id of one of the name's events; narrows the audience to it
    #[arg(long, requires = "name")]
    pub event: Option<String>,

    /// How the audience is chosen from the filtered contacts
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    /// Email to include or exclude (repeatable)
    #[arg(long = "select", value_name = "EMAIL")]
    pub select: Vec<String>,

    /// Subject line (defaults to the built-in template)
    #[arg(long)]
    pub subject: Option<String>,

    /// File holding the message body (defaults to the built-in template)
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Attachment (pdf, doc, jpg, jpeg, png)
    #[arg(long)]
    pub attachment: Option<PathBuf>,

    /// Signature image (jpg, jpeg, png)
    #[arg(long)]
    pub signature: Option<PathBuf>,

    /// Sender name substituted into the body
    #[arg(long)]
    pub sender: Option<String>,

    /// Resolve recipients and print the message without sending
    #[arg(long)]
    pub dry_run: bool,

    /// Print the dry-run preview as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchBy {
    Name,
    NameTeam,
    NameEvent,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Everyone in the filtered contacts
    All,
    /// Only the selected emails
    Include,
    /// Everyone except the selected emails
    Exclude,
}

impl From<ModeArg> for SelectionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::All => SelectionMode::All,
            ModeArg::Include => SelectionMode::Include,
            ModeArg::Exclude => SelectionMode::Exclude,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
