//! Pushes local reminder mutations to the remote collection.

use chrono::Utc;

use crate::models::{Reminder, ReminderId};
use crate::remote::{BlobStorage, RemoteCollection};
use crate::{Error, Result};

use super::attachments;

/// Writes one owner's reminders to the remote collection.
///
/// Holds no state of its own; the session hands it the remote handles and
/// the signed-in owner for each operation.
pub struct Writer<'a, R, B> {
    remote: &'a R,
    blobs: &'a B,
    owner_id: &'a str,
}

impl<'a, R: RemoteCollection, B: BlobStorage> Writer<'a, R, B> {
    pub const fn new(remote: &'a R, blobs: &'a B, owner_id: &'a str) -> Self {
        Self {
            remote,
            blobs,
            owner_id,
        }
    }

    /// Upload pending attachments, then merge the full record remotely.
    ///
    /// Returns the record as written, with attachment URLs in place.
    pub async fn create(&self, reminder: &Reminder) -> Result<Reminder> {
        let outgoing = self.prepare(reminder).await?;
        self.remote
            .set_merge(self.owner_id, &outgoing)
            .await
            .map_err(remote_write_error)?;
        tracing::info!("Pushed reminder {} to remote", outgoing.id);
        Ok(outgoing)
    }

    /// Upload pending attachments, then update the existing remote document.
    pub async fn update(&self, reminder: &Reminder) -> Result<Reminder> {
        let outgoing = self.prepare(reminder).await?;
        self.remote
            .update(self.owner_id, &outgoing)
            .await
            .map_err(remote_write_error)?;
        tracing::info!("Updated remote reminder {}", outgoing.id);
        Ok(outgoing)
    }

    /// Delete attachments (best-effort), then the remote document.
    pub async fn delete(&self, id: &ReminderId) -> Result<()> {
        attachments::delete_attachments(self.blobs, self.owner_id, id).await;
        self.remote
            .delete(self.owner_id, id)
            .await
            .map_err(remote_write_error)?;
        tracing::info!("Deleted remote reminder {id}");
        Ok(())
    }

    async fn prepare(&self, reminder: &Reminder) -> Result<Reminder> {
        let mut outgoing = reminder.clone();
        outgoing.owner_id = Some(self.owner_id.to_string());
        outgoing.updated_at = Some(Utc::now());
        attachments::upload_pending(self.blobs, self.owner_id, &mut outgoing).await?;
        Ok(outgoing)
    }
}

fn remote_write_error(error: Error) -> Error {
    match error {
        Error::RemoteWrite(_) | Error::NotAuthenticated => error,
        other => Error::RemoteWrite(other.to_string()),
    }
}
