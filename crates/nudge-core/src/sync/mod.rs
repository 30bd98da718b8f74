//! Reminder sync engine.
//!
//! Local edits go out through the [`Writer`], remote changes come back as
//! ordered batches on a [`Subscription`] and are applied by the
//! [`Reconciler`]. [`SyncSession`] ties both directions to a signed-in
//! [`Identity`].

pub mod attachments;
mod reconciler;
mod resync;
mod session;
mod subscription;
mod writer;

pub use reconciler::{ApplyReport, Reconciler, ReminderObserver};
pub use resync::{push_all, ResyncReport};
pub use session::{Identity, SharedObserver, SyncSession, WriteOutcome};
pub use subscription::{channel, BatchSender, ListenerEvent, Subscription};
pub use writer::Writer;
