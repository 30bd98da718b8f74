//! Bulk push of local reminders.

use serde::Serialize;

use crate::models::{AttachmentKind, Reminder};
use crate::remote::{BlobStorage, RemoteCollection};
use crate::store::LocalStore;
use crate::Result;

use super::Writer;

/// Outcome of a bulk push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    pub synced: usize,
    pub errors: usize,
}

/// Push every reminder in the store, one at a time, counting failures
/// without stopping.
///
/// Attachments uploaded along the way are written back, so the next push
/// does not upload them again.
pub async fn push_all<R, B>(writer: &Writer<'_, R, B>, store: &LocalStore) -> Result<ResyncReport>
where
    R: RemoteCollection,
    B: BlobStorage,
{
    let reminders = store.load_reminders().await?;
    let mut report = ResyncReport::default();
    for reminder in &reminders {
        match writer.create(reminder).await {
            Ok(sent) => {
                report.synced += 1;
                if reminder.has_pending_attachments() {
                    store_uploaded(store, reminder, &sent).await?;
                }
            }
            Err(error) => {
                tracing::warn!("Failed to push reminder {}: {error}", reminder.id);
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        "Resync finished: {} synced, {} failed",
        report.synced,
        report.errors
    );
    Ok(report)
}

/// Swap uploaded URLs into the local copy.
///
/// Slots edited or cleared since the push started are left alone, and a
/// reminder deleted meanwhile is not brought back.
async fn store_uploaded(store: &LocalStore, pushed: &Reminder, sent: &Reminder) -> Result<()> {
    store
        .mutate(|reminders| {
            let Some(local) = reminders.iter_mut().find(|local| local.id == pushed.id) else {
                return Ok(());
            };
            for kind in AttachmentKind::ALL {
                if local.attachment(kind) == pushed.attachment(kind) {
                    local.set_attachment(kind, sent.attachment(kind).cloned());
                }
            }
            Ok(())
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttachmentRef;
    use crate::remote::memory::{MemoryBlobStorage, MemoryCollection};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let remote = MemoryCollection::new();
        let blobs = MemoryBlobStorage::new();
        let store = LocalStore::open_in_memory().unwrap();
        let reminders: Vec<_> = ["one", "two", "three"]
            .into_iter()
            .map(|title| Reminder::new(title, Utc::now()))
            .collect();
        store.save_reminders(&reminders).await.unwrap();
        remote.fail_writes_for(&reminders[1].id);

        let writer = Writer::new(&remote, &blobs, "u1");
        let report = push_all(&writer, &store).await.unwrap();

        assert_eq!(report, ResyncReport { synced: 2, errors: 1 });
        assert!(remote.document("u1", &reminders[0].id).is_some());
        assert!(remote.document("u1", &reminders[1].id).is_none());
        assert!(remote.document("u1", &reminders[2].id).is_some());
    }

    #[tokio::test]
    async fn empty_store_pushes_nothing() {
        let remote = MemoryCollection::new();
        let blobs = MemoryBlobStorage::new();
        let store = LocalStore::open_in_memory().unwrap();
        let report = push_all(&Writer::new(&remote, &blobs, "u1"), &store)
            .await
            .unwrap();
        assert_eq!(report, ResyncReport::default());
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn uploaded_attachments_are_stored_and_not_uploaded_twice() {
        let remote = MemoryCollection::new();
        let blobs = MemoryBlobStorage::new();
        let store = LocalStore::open_in_memory().unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("p.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        let mut reminder = Reminder::new("With photo", Utc::now());
        reminder.photo = Some(AttachmentRef::pending(&photo));
        store.upsert_reminder(&reminder).await.unwrap();

        let writer = Writer::new(&remote, &blobs, "u1");
        push_all(&writer, &store).await.unwrap();

        let local = store.get_reminder(&reminder.id).await.unwrap().unwrap();
        assert!(!local.has_pending_attachments());
        assert_eq!(
            local.photo.as_ref().and_then(AttachmentRef::url),
            remote
                .document("u1", &reminder.id)
                .unwrap()
                .photo
                .as_ref()
                .and_then(AttachmentRef::url)
        );

        // The payload is gone, yet the second push succeeds from the stored URL
        std::fs::remove_file(&photo).unwrap();
        blobs.fail_uploads(true);
        let report = push_all(&writer, &store).await.unwrap();
        assert_eq!(report, ResyncReport { synced: 1, errors: 0 });
    }
}
