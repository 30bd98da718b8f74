//! Attachment references carried by reminders

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The two attachment slots a reminder can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Photo slot, stored as `photo.jpg`
    Photo,
    /// Voice note slot, stored as `voice.mp3`
    Voice,
}

impl AttachmentKind {
    /// Every slot, in the order uploads and deletes are attempted.
    pub const ALL: [Self; 2] = [Self::Photo, Self::Voice];

    /// Fixed object file name for this slot.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Photo => "photo.jpg",
            Self::Voice => "voice.mp3",
        }
    }

    /// Content type sent with uploads for this slot.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Photo => "image/jpeg",
            Self::Voice => "audio/mpeg",
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => f.write_str("photo"),
            Self::Voice => f.write_str("voice"),
        }
    }
}

/// Where an attachment payload currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AttachmentRef {
    /// Payload recorded on this device and not yet uploaded
    Pending {
        /// Local file holding the payload
        path: PathBuf,
    },
    /// Payload already in blob storage
    Uploaded {
        /// Retrieval URL returned by blob storage
        url: String,
    },
}

impl AttachmentRef {
    /// Reference a local file that still needs uploading.
    pub fn pending(path: impl Into<PathBuf>) -> Self {
        Self::Pending { path: path.into() }
    }

    /// Reference an uploaded object by its retrieval URL.
    pub fn uploaded(url: impl Into<String>) -> Self {
        Self::Uploaded { url: url.into() }
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Local payload path, when not yet uploaded.
    #[must_use]
    pub fn pending_path(&self) -> Option<&Path> {
        match self {
            Self::Pending { path } => Some(path),
            Self::Uploaded { .. } => None,
        }
    }

    /// Retrieval URL, once uploaded.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Pending { .. } => None,
            Self::Uploaded { url } => Some(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_have_fixed_file_names() {
        assert_eq!(AttachmentKind::Photo.file_name(), "photo.jpg");
        assert_eq!(AttachmentKind::Voice.file_name(), "voice.mp3");
        assert_eq!(AttachmentKind::Voice.content_type(), "audio/mpeg");
    }

    #[test]
    fn attachment_ref_serializes_with_state_tag() {
        let pending = AttachmentRef::pending("/tmp/photo.jpg");
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["state"], "pending");
        assert_eq!(json["path"], "/tmp/photo.jpg");

        let uploaded: AttachmentRef =
            serde_json::from_str(r#"{"state":"uploaded","url":"https://cdn/x.jpg"}"#).unwrap();
        assert_eq!(uploaded.url(), Some("https://cdn/x.jpg"));
        assert!(!uploaded.is_pending());
    }
}
