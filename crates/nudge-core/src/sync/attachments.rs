//! Attachment upload and cleanup for reminder photo and voice slots.

use crate::models::{AttachmentKind, AttachmentRef, Reminder, ReminderId};
use crate::remote::BlobStorage;
use crate::{Error, Result};

/// Object key for an attachment slot.
///
/// Each reminder has one photo and one voice slot, so re-uploading replaces
/// the previous object.
#[must_use]
pub fn attachment_object_key(owner_id: &str, reminder_id: &ReminderId, kind: AttachmentKind) -> String {
    format!(
        "users/{owner_id}/reminders/{reminder_id}/{}",
        kind.file_name()
    )
}

/// Upload a pending attachment and return the uploaded reference.
///
/// References that are already uploaded are returned unchanged.
pub async fn upload_attachment<B: BlobStorage>(
    blobs: &B,
    owner_id: &str,
    reminder_id: &ReminderId,
    kind: AttachmentKind,
    attachment: &AttachmentRef,
) -> Result<AttachmentRef> {
    let Some(path) = attachment.pending_path() else {
        return Ok(attachment.clone());
    };

    let bytes = tokio::fs::read(path).await.map_err(|error| {
        Error::Upload(format!(
            "cannot read {kind} payload {}: {error}",
            path.display()
        ))
    })?;

    let object_key = attachment_object_key(owner_id, reminder_id, kind);
    let url = blobs
        .upload(&object_key, bytes, kind.content_type())
        .await
        .map_err(|error| match error {
            Error::Upload(_) => error,
            other => Error::Upload(format!("{kind} for {reminder_id}: {other}")),
        })?;

    tracing::debug!("Uploaded {kind} for reminder {reminder_id}");
    Ok(AttachmentRef::uploaded(url))
}

/// Replace every pending attachment on `reminder` with its uploaded URL.
///
/// Stops at the first failure; the reminder is left untouched in that case.
pub async fn upload_pending<B: BlobStorage>(
    blobs: &B,
    owner_id: &str,
    reminder: &mut Reminder,
) -> Result<()> {
    let mut uploaded = Vec::new();
    for kind in AttachmentKind::ALL {
        if let Some(attachment) = reminder.attachment(kind).filter(|a| a.is_pending()) {
            let reference =
                upload_attachment(blobs, owner_id, &reminder.id, kind, attachment).await?;
            uploaded.push((kind, reference));
        }
    }

    for (kind, reference) in uploaded {
        reminder.set_attachment(kind, Some(reference));
    }
    Ok(())
}

/// Delete both attachment slots for a reminder.
///
/// Best-effort: missing objects are ignored and other failures are logged.
pub async fn delete_attachments<B: BlobStorage>(blobs: &B, owner_id: &str, reminder_id: &ReminderId) {
    for kind in AttachmentKind::ALL {
        let object_key = attachment_object_key(owner_id, reminder_id, kind);
        match blobs.delete(&object_key).await {
            Ok(()) => tracing::debug!("Deleted {kind} for reminder {reminder_id}"),
            Err(Error::NotFound(_)) => {}
            Err(error) => {
                tracing::warn!("Failed to delete {kind} for reminder {reminder_id}: {error}");
            }
        }
    }
}
