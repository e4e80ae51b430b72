use thiserror::Error;

use crate::types::ResourceKind;

/// Failure of a single round trip to the card-scan backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    pub fn rejected(status: u16, detail: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            detail: detail.into(),
        }
    }

    /// Server-provided detail when the backend answered, otherwise the error text.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Rejected { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

/// Input problems caught before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("Please select at least one recipient")]
    EmptyRecipients,

    #[error("No selection mode has been chosen")]
    NoSelectionMode,

    #[error("A dispatch is already in progress for this session")]
    DispatchInFlight,

    #[error("File type of '{file_name}' is not supported for {kind}")]
    UnsupportedFileType {
        kind: ResourceKind,
        file_name: String,
    },

    #[error("The {kind} '{file_name}' is empty")]
    EmptyResource {
        kind: ResourceKind,
        file_name: String,
    },

    #[error("Select a name before choosing an event")]
    NameRequired,

    #[error("Event batch '{0}' is not among the events of the selected name")]
    UnknownEvent(String),
}

/// Error taxonomy of the dispatch lifecycle.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Upload of {kind} failed: {cause}")]
    Upload {
        kind: ResourceKind,
        #[source]
        cause: ApiError,
    },

    #[error("Dispatch failed: {}", .0.detail())]
    Dispatch(#[source] ApiError),

    #[error("Queue status unavailable after {attempts} attempts: {cause}")]
    Poll {
        attempts: u32,
        #[source]
        cause: ApiError,
    },

    #[error("Catalog error: {0}")]
    Catalog(#[source] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Validation failures are fixed by correcting input; everything else needs a retry.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}
