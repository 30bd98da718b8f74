//! Error types for nudge-core

use thiserror::Error;

/// Result type alias using nudge-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in nudge-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A sync operation was attempted without a signed-in identity
    #[error("Not authenticated: sign in before enabling sync")]
    NotAuthenticated,

    /// Writing a document to the remote collection failed
    #[error("Remote write failed: {0}")]
    RemoteWrite(String),

    /// Uploading an attachment to blob storage failed
    #[error("Attachment upload failed: {0}")]
    Upload(String),

    /// The remote subscription stopped delivering changes
    #[error("Sync listener failed: {0}")]
    Listener(String),

    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Reminder or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Media/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
