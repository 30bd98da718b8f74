//! Data models for Nudge

mod attachment;
mod change;
mod reminder;
mod settings;

pub use attachment::{AttachmentKind, AttachmentRef};
pub use change::{ChangeKind, ChangeRecord, RemovedDocument};
pub use reminder::{Priority, Reminder, ReminderId};
pub use settings::{AppMode, Settings};
