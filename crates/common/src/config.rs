use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the card-scan backend
    pub api_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Delay between an accepted submission and the first status read
    pub poll_initial_delay_ms: u64,

    /// Delay between status reads while the queue is processing
    pub poll_interval_ms: u64,

    /// Consecutive failed status reads tolerated before giving up
    pub poll_max_retries: u32,

    /// Base delay after a failed status read; doubles per consecutive failure
    pub poll_retry_backoff_ms: u64,

    /// Sender identity substituted when neither an explicit sender nor a name is selected
    pub default_sender: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 30_000,
            poll_initial_delay_ms: 2_000,
            poll_interval_ms: 3_000,
            poll_max_retries: 3,
            poll_retry_backoff_ms: 1_000,
            default_sender: "Team Member".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let config = Self {
            api_url: std::env::var("CARDSCAN_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            request_timeout_ms: parse_var(
                "CARDSCAN_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            poll_initial_delay_ms: parse_var(
                "DISPATCH_POLL_INITIAL_DELAY_MS",
                defaults.poll_initial_delay_ms,
            )?,
            poll_interval_ms: parse_var("DISPATCH_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            poll_max_retries: parse_var("DISPATCH_POLL_MAX_RETRIES", defaults.poll_max_retries)?,
            poll_retry_backoff_ms: parse_var(
                "DISPATCH_POLL_RETRY_BACKOFF_MS",
                defaults.poll_retry_backoff_ms,
            )?,
            default_sender: std::env::var("DISPATCH_DEFAULT_SENDER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_sender),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "CARDSCAN_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "CARDSCAN_REQUEST_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "DISPATCH_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            anyhow::anyhow!(
                "{} must be a valid {}",
                key,
                std::any::type_name::<T>()
            )
        }),
        Err(_) => Ok(default),
    }
}
