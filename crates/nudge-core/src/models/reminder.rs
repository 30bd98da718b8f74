//! Reminder model

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::Error;

use super::attachment::{AttachmentKind, AttachmentRef};

/// A reminder identifier.
///
/// Identifiers are always carried as strings. Older clients generated numeric
/// millisecond timestamps, so deserialization also accepts JSON integers and
/// converts them to their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ReminderId(String);

impl ReminderId {
    /// Create a new unique reminder ID using UUID v7 (time-sortable)
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ReminderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReminderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "Reminder id cannot be empty".to_string(),
            ));
        }
        if trimmed.contains('/') {
            return Err(Error::InvalidInput(format!(
                "Reminder id cannot contain '/': {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<i64> for ReminderId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ReminderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text.parse().map_err(de::Error::custom),
            RawId::Number(number) => Ok(Self::from(number)),
        }
    }
}

/// Priority label shown next to a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "normal" => Ok(Self::Medium),
            "high" | "urgent" => Ok(Self::High),
            other => Err(format!("unknown priority '{other}' (expected low, medium or high)")),
        }
    }
}

/// A reminder in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    /// Stable identifier, shared with the remote document key
    pub id: ReminderId,
    /// Short title shown in notifications
    pub title: String,
    /// Longer free-form text
    #[serde(default)]
    pub body: String,
    /// When the reminder is due
    #[serde(rename = "datetime")]
    pub due_at: DateTime<Utc>,
    /// Completion flag
    #[serde(default)]
    pub completed: bool,
    /// Repeat interval in minutes, if the reminder recurs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_minutes: Option<u32>,
    /// Category or project label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<AttachmentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<AttachmentRef>,
    /// Owning user, stamped when the reminder is pushed
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Fields written by other clients that this version does not model
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Reminder {
    /// Create a new reminder due at the given time
    #[must_use]
    pub fn new(title: impl Into<String>, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: ReminderId::new(),
            title: title.into(),
            body: String::new(),
            due_at,
            completed: false,
            repeat_minutes: None,
            category: None,
            priority: Priority::default(),
            photo: None,
            voice: None,
            owner_id: None,
            created_at: Some(now),
            updated_at: Some(now),
            extra: BTreeMap::new(),
        }
    }

    /// Stamp a fresh local update time.
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Attachment held in the given slot.
    #[must_use]
    pub const fn attachment(&self, kind: AttachmentKind) -> Option<&AttachmentRef> {
        match kind {
            AttachmentKind::Photo => self.photo.as_ref(),
            AttachmentKind::Voice => self.voice.as_ref(),
        }
    }

    pub fn set_attachment(&mut self, kind: AttachmentKind, value: Option<AttachmentRef>) {
        match kind {
            AttachmentKind::Photo => self.photo = value,
            AttachmentKind::Voice => self.voice = value,
        }
    }

    /// Whether any slot still holds a local-only payload.
    #[must_use]
    pub fn has_pending_attachments(&self) -> bool {
        AttachmentKind::ALL
            .iter()
            .filter_map(|kind| self.attachment(*kind))
            .any(AttachmentRef::is_pending)
    }

    /// Due and not yet completed at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_at <= now
    }

    /// Next due time strictly after `now` for a repeating reminder.
    #[must_use]
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let minutes = self.repeat_minutes.filter(|minutes| *minutes > 0)?;
        let step = Duration::minutes(i64::from(minutes));
        if self.due_at > now {
            return Some(self.due_at + step);
        }

        let elapsed = (now - self.due_at).num_minutes();
        let steps = elapsed / i64::from(minutes) + 1;
        Some(self.due_at + Duration::minutes(steps * i64::from(minutes)))
    }

    /// Mark done, or advance to the next occurrence when the reminder repeats.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        if let Some(next) = self.next_occurrence(now) {
            self.due_at = next;
            self.completed = false;
        } else {
            self.completed = true;
        }
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn reminder_id_unique() {
        assert_ne!(ReminderId::new(), ReminderId::new());
    }

    #[test]
    fn reminder_id_accepts_legacy_numeric_json() {
        let id: ReminderId = serde_json::from_str("1704103200000").unwrap();
        assert_eq!(id.as_str(), "1704103200000");

        let id: ReminderId = serde_json::from_str("\"1704103200000\"").unwrap();
        assert_eq!(id, ReminderId::from(1_704_103_200_000));
    }

    #[test]
    fn reminder_id_rejects_empty_and_path_separators() {
        assert!("  ".parse::<ReminderId>().is_err());
        assert!("a/b".parse::<ReminderId>().is_err());
        assert!(serde_json::from_str::<ReminderId>("\"\"").is_err());
    }

    #[test]
    fn reminder_serializes_with_wire_names() {
        let mut reminder = Reminder::new("Pay bill", due());
        reminder.repeat_minutes = Some(30);
        reminder.owner_id = Some("user-1".to_string());

        let json = serde_json::to_value(&reminder).unwrap();
        assert_eq!(json["title"], "Pay bill");
        assert_eq!(json["datetime"], "2024-01-01T10:00:00Z");
        assert_eq!(json["repeatMinutes"], 30);
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["priority"], "medium");
        assert!(json.get("photo").is_none());
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let raw = r#"{
            "id": 42,
            "title": "Water plants",
            "datetime": "2024-01-01T10:00:00Z",
            "completed": false,
            "caregiverNote": "use the blue can",
            "streak": 3
        }"#;

        let reminder: Reminder = serde_json::from_str(raw).unwrap();
        assert_eq!(reminder.id.as_str(), "42");
        assert_eq!(reminder.extra["caregiverNote"], "use the blue can");
        assert_eq!(reminder.extra["streak"], 3);

        let back = serde_json::to_value(&reminder).unwrap();
        assert_eq!(back["caregiverNote"], "use the blue can");
    }

    #[test]
    fn complete_without_repeat_sets_flag() {
        let mut reminder = Reminder::new("Call mom", due());
        reminder.complete(due() + Duration::minutes(5));
        assert!(reminder.completed);
        assert_eq!(reminder.due_at, due());
    }

    #[test]
    fn complete_with_repeat_advances_past_now() {
        let mut reminder = Reminder::new("Stretch", due());
        reminder.repeat_minutes = Some(60);

        reminder.complete(due() + Duration::minutes(150));
        assert!(!reminder.completed);
        assert_eq!(reminder.due_at, due() + Duration::minutes(180));
    }

    #[test]
    fn next_occurrence_for_future_reminder_is_one_step_ahead() {
        let mut reminder = Reminder::new("Stretch", due());
        reminder.repeat_minutes = Some(15);
        assert_eq!(
            reminder.next_occurrence(due() - Duration::minutes(1)),
            Some(due() + Duration::minutes(15))
        );
    }

    #[test]
    fn pending_attachments_detected() {
        let mut reminder = Reminder::new("Photo reminder", due());
        assert!(!reminder.has_pending_attachments());

        reminder.set_attachment(AttachmentKind::Voice, Some(AttachmentRef::pending("a.mp3")));
        assert!(reminder.has_pending_attachments());

        reminder.set_attachment(
            AttachmentKind::Voice,
            Some(AttachmentRef::uploaded("https://cdn/voice.mp3")),
        );
        assert!(!reminder.has_pending_attachments());
    }

    #[test]
    fn priority_parses_labels() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("normal".parse::<Priority>().unwrap(), Priority::Medium);
        assert!("whenever".parse::<Priority>().is_err());
    }
}
