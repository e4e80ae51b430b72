//! # Cardmail CLI
//!
//! Operator entry point: configuration, logging, and command dispatch.

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::Layer;

use cardmail_client::api::{CardscanApi, ReqwestApiClient};
use cardmail_common::config::AppConfig;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut config = AppConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
        config.validate()?;
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %config.api_url,
        "Cardmail starting"
    );

    let api: Arc<dyn CardscanApi> = Arc::new(ReqwestApiClient::from_config(&config)?);

    let result = match &cli.command {
        Commands::Batches(args) => commands::run_batches(api, args).await,
        Commands::Names(args) => commands::run_names(api, args).await,
        Commands::Contacts(args) => commands::run_contacts(api, args).await,
        Commands::Events(args) => commands::run_events(api, args).await,
        Commands::Search(args) => commands::run_search(api, args).await,
        Commands::Status(args) => commands::run_status(api, args).await,
        Commands::Send(args) => commands::run_send(api, &config, args).await,
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

fn init_logging(cli: &Cli) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("cardmail_cli=info,cardmail_client=info"),
        1 => EnvFilter::new("cardmail_cli=debug,cardmail_client=debug,cardmail_engine=debug"),
        _ => EnvFilter::new("trace"),
    });

    let fmt_layer = match cli.log_format {
        cli::LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        cli::LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        cli::LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
