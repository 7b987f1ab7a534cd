// File: src/error.rs
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PantryError {
    /// Nothing usable was left after normalization. The user has to rephrase.
    #[error("No ingredients recognised in '{raw}'. Please list a few ingredients.")]
    InvalidQuery { raw: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Why the recipe provider could not produce candidates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Recipe provider quota exceeded")]
    QuotaExceeded,

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Recipe provider did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Fetch worker stopped before answering")]
    Disconnected,
}

impl FetchError {
    /// Short, stable reason shown alongside degraded results.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::QuotaExceeded => "quota-exceeded",
            FetchError::MalformedResponse(_) => "malformed-response",
            FetchError::Timeout(_) => "timeout",
            FetchError::Disconnected => "disconnected",
        }
    }
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot encoding error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl From<tempfile::PersistError> for PersistenceError {
    fn from(err: tempfile::PersistError) -> Self {
        PersistenceError::Io(err.error)
    }
}

/// Training could not produce usable weights; the previous ones stay active.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrainingError {
    #[error("No feedback events in the training window")]
    EmptyWindow,

    #[error("Feedback window holds a single label class (positive: {positive})")]
    SingleClass { positive: bool },

    #[error("Training diverged to a non-finite weight")]
    NonFinite,
}
