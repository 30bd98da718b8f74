use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] nudge_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No reminder title provided")]
    EmptyTitle,
    #[error("Reminder ID cannot be empty")]
    EmptyReminderId,
    #[error("Reminder not found for id/prefix: {0}")]
    ReminderNotFound(String),
    #[error("{0}")]
    AmbiguousReminderId(String),
    #[error("Invalid due time '{0}': use RFC 3339, \"YYYY-MM-DD HH:MM\", or +30m/+2h/+1d")]
    InvalidDueTime(String),
    #[error("Nothing to change: pass at least one field to edit")]
    NothingToEdit,
    #[error("Could not resolve a data directory; pass --db-path or set NUDGE_DB_PATH")]
    NoDataDir,
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Sync is not configured. Set NUDGE_FIREBASE_PROJECT_ID and NUDGE_FIREBASE_API_KEY (and R2_* for attachments)."
    )]
    SyncNotConfigured,
    #[error("Not signed in. Run `nudge auth login` first.")]
    NotSignedIn,
    #[error("Sync is disabled. Run `nudge sync enable` first.")]
    SyncDisabled,
    #[error("Attachment file not found: {0}")]
    AttachmentNotFound(String),
    #[error("Saved {id} locally, but pushing it failed: {source}")]
    PushFailed {
        id: String,
        source: nudge_core::Error,
    },
}
