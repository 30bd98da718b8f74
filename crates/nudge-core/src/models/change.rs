//! Change records delivered by the remote subscription

use std::fmt;

use serde::{Deserialize, Serialize};

use super::reminder::{Reminder, ReminderId};

/// Kind of a single remote delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => f.write_str("added"),
            Self::Modified => f.write_str("modified"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// Document reference carried by a removal; any other fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedDocument {
    pub id: ReminderId,
}

/// A single added/modified/removed delta, as `{type, document}` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "document", rename_all = "lowercase")]
pub enum ChangeRecord {
    Added(Reminder),
    Modified(Reminder),
    Removed(RemovedDocument),
}

impl ChangeRecord {
    #[must_use]
    pub const fn removed(id: ReminderId) -> Self {
        Self::Removed(RemovedDocument { id })
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Added(_) => ChangeKind::Added,
            Self::Modified(_) => ChangeKind::Modified,
            Self::Removed(_) => ChangeKind::Removed,
        }
    }

    /// Identifier of the document this record touches.
    #[must_use]
    pub const fn id(&self) -> &ReminderId {
        match self {
            Self::Added(reminder) | Self::Modified(reminder) => &reminder.id,
            Self::Removed(document) => &document.id,
        }
    }
}
