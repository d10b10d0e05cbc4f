//! Error type shared by all WordNest crates.

use thiserror::Error;

/// Errors raised by WordNest components.
#[derive(Debug, Error)]
pub enum WordNestError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("store error: {0}")]
    Store(String),

    /// A stored profile exists but cannot be decoded. Not retryable.
    #[error("corrupt profile: {0}")]
    CorruptProfile(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("sync error: {0}")]
    Sync(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WordNestError>;
