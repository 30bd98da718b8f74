//! Remote collaborators: the document collection and blob storage.
//!
//! The sync engine only talks to these traits. Concrete backends live in the
//! submodules: Firestore over REST, Cloudflare R2, and in-process memory
//! backends used by tests.

pub mod firestore;
pub mod memory;
mod r2;

pub use r2::{R2Config, R2Storage};

use crate::models::{Reminder, ReminderId};
use crate::sync::Subscription;
use crate::{Error, Result};

/// Per-user reminder collection in the remote document store.
///
/// Documents live at `users/{owner_id}/reminders/{reminder_id}`.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection {
    /// Write the full record, creating the document if needed and keeping
    /// fields that only exist remotely.
    async fn set_merge(&self, owner_id: &str, reminder: &Reminder) -> Result<()>;

    /// Update an existing document; fails when it does not exist.
    async fn update(&self, owner_id: &str, reminder: &Reminder) -> Result<()>;

    /// Delete a document.
    async fn delete(&self, owner_id: &str, id: &ReminderId) -> Result<()>;

    /// Subscribe to the owner's collection ordered by due time ascending.
    ///
    /// The first batch describes every existing document as added.
    fn subscribe(&self, owner_id: &str) -> Result<Subscription>;
}

/// Binary object storage for reminder attachments.
#[allow(async_fn_in_trait)]
pub trait BlobStorage {
    /// Store `bytes` under `object_key`, replacing any previous object, and
    /// return a retrieval URL.
    async fn upload(&self, object_key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String>;

    /// Delete the object. A missing object is reported as [`Error::NotFound`].
    async fn delete(&self, object_key: &str) -> Result<()>;
}

/// Unconfigured storage: uploads fail, deletes report nothing to delete.
impl<B: BlobStorage> BlobStorage for Option<B> {
    async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        match self {
            Some(storage) => storage.upload(object_key, bytes, content_type).await,
            None => Err(Error::Storage(
                "attachment storage is not configured".to_string(),
            )),
        }
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        match self {
            Some(storage) => storage.delete(object_key).await,
            None => Err(Error::NotFound(object_key.to_string())),
        }
    }
}

/// Collection path for an owner's reminders.
#[must_use]
pub fn collection_path(owner_id: &str) -> String {
    format!("users/{owner_id}/reminders")
}

/// Document path for a single reminder.
#[must_use]
pub fn document_path(owner_id: &str, id: &ReminderId) -> String {
    format!("{}/{id}", collection_path(owner_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_path_is_scoped_by_owner() {
        let id: ReminderId = "r1".parse().unwrap();
        assert_eq!(document_path("u1", &id), "users/u1/reminders/r1");
    }

    #[tokio::test]
    async fn missing_storage_fails_uploads_and_reports_missing_on_delete() {
        let storage: Option<memory::MemoryBlobStorage> = None;
        assert!(matches!(
            storage.upload("k", vec![1], "image/jpeg").await,
            Err(Error::Storage(_))
        ));
        assert!(matches!(storage.delete("k").await, Err(Error::NotFound(_))));
    }
}
