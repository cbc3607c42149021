//! SlotPilot error types.

use thiserror::Error;

/// Errors surfaced across the SlotPilot crates.
#[derive(Debug, Error)]
pub enum SlotPilotError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Portal error: {0}")]
    Portal(String),

    /// No open page session to carry out a portal action. Transient: the
    /// operation is abandoned for this tick and retried on the next trigger.
    #[error("No portal session available")]
    NoPortal,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("License error: {0}")]
    License(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SlotPilotError>;
