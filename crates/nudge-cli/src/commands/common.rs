use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use nudge_core::auth::AuthSession;
use nudge_core::config::FirebaseConfig;
use nudge_core::models::{AttachmentKind, AttachmentRef, Priority};
use nudge_core::remote::firestore::FirestoreCollection;
use nudge_core::remote::{R2Config, R2Storage};
use nudge_core::store::LocalStore;
use nudge_core::sync::{SharedObserver, SyncSession, WriteOutcome};
use nudge_core::util::normalize_text_option;
use nudge_core::{Reminder, ReminderId};
use serde::Serialize;

use crate::auth::{auth_client, AuthClient};
use crate::cli::ReminderFields;
use crate::error::CliError;

const SHORT_ID_LEN: usize = 13;
const LOCAL_DUE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

pub type CliSyncSession = SyncSession<FirestoreCollection, Option<R2Storage>>;

#[derive(Debug, Serialize)]
pub struct ReminderListItem {
    pub id: String,
    pub title: String,
    pub body: String,
    pub due_at: String,
    pub relative_time: String,
    pub completed: bool,
    pub repeat_minutes: Option<u32>,
    pub category: Option<String>,
    pub priority: Priority,
    pub photo_url: Option<String>,
    pub voice_url: Option<String>,
    pub pending_upload: bool,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("NUDGE_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path().ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("nudge").join("nudge.db"))
}

pub fn open_store(path: &Path) -> Result<LocalStore, CliError> {
    Ok(LocalStore::open_path(path)?)
}

pub fn normalize_title(title: &str) -> Result<String, CliError> {
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyTitle)
    } else {
        Ok(collapsed)
    }
}

pub fn normalize_reminder_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyReminderId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Parse a due time relative to `now`.
///
/// Accepts `now`, offsets such as `+30m`, `+2h` or `+1d`, RFC 3339
/// timestamps, and local `YYYY-MM-DD HH:MM` times.
pub fn parse_due(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, CliError> {
    let trimmed = input.trim();
    let invalid = || CliError::InvalidDueTime(trimmed.to_string());

    if trimmed.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Some(offset) = trimmed.strip_prefix('+') {
        let unit = offset.chars().last().ok_or_else(invalid)?;
        let amount: u32 = offset[..offset.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| invalid())?;
        let amount = i64::from(amount);
        let step = match unit {
            'm' => Duration::try_minutes(amount),
            'h' => Duration::try_hours(amount),
            'd' => Duration::try_days(amount),
            _ => None,
        }
        .ok_or_else(invalid)?;
        return now.checked_add_signed(step).ok_or_else(invalid);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    LOCAL_DUE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Copy the optional fields given on the command line onto a reminder.
pub fn apply_fields(reminder: &mut Reminder, fields: ReminderFields) -> Result<(), CliError> {
    if let Some(body) = fields.body {
        reminder.body = body.trim().to_string();
    }
    if let Some(minutes) = fields.repeat {
        reminder.repeat_minutes = (minutes > 0).then_some(minutes);
    }
    if fields.category.is_some() {
        reminder.category = normalize_text_option(fields.category);
    }
    if let Some(priority) = fields.priority {
        reminder.priority = priority;
    }
    for (kind, path) in [
        (AttachmentKind::Photo, fields.photo),
        (AttachmentKind::Voice, fields.voice),
    ] {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(CliError::AttachmentNotFound(path.display().to_string()));
            }
            reminder.set_attachment(kind, Some(AttachmentRef::pending(path)));
        }
    }
    Ok(())
}

pub async fn resolve_reminder(query: &str, store: &LocalStore) -> Result<Reminder, CliError> {
    let reminders = store.load_reminders().await?;

    if let Some(exact) = reminders.iter().find(|reminder| reminder.id.as_str() == query) {
        return Ok(exact.clone());
    }

    let mut matching = reminders
        .into_iter()
        .filter(|reminder| reminder.id.as_str().starts_with(query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::ReminderNotFound(query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|reminder| short_id(&reminder.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousReminderId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &ReminderId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_reminder_lines(reminders: &[Reminder]) -> Vec<String> {
    let now = Utc::now();
    reminders
        .iter()
        .map(|reminder| {
            let mark = if reminder.completed { "[x]" } else { "[ ]" };
            let title = truncate(&reminder.title, 40);
            let relative_time = format_relative_due(reminder.due_at, now);
            let details = render_details(reminder);

            if details.is_empty() {
                format!(
                    "{:<13}  {mark} {title:<40}  {relative_time}",
                    short_id(&reminder.id)
                )
            } else {
                format!(
                    "{:<13}  {mark} {title:<40}  {relative_time:<12}  {details}",
                    short_id(&reminder.id)
                )
            }
        })
        .collect()
}

pub fn reminder_to_list_item(reminder: &Reminder) -> ReminderListItem {
    ReminderListItem {
        id: reminder.id.to_string(),
        title: reminder.title.clone(),
        body: reminder.body.clone(),
        due_at: reminder.due_at.to_rfc3339(),
        relative_time: format_relative_due(reminder.due_at, Utc::now()),
        completed: reminder.completed,
        repeat_minutes: reminder.repeat_minutes,
        category: reminder.category.clone(),
        priority: reminder.priority,
        photo_url: reminder.photo.as_ref().and_then(AttachmentRef::url).map(str::to_string),
        voice_url: reminder.voice.as_ref().and_then(AttachmentRef::url).map(str::to_string),
        pending_upload: reminder.has_pending_attachments(),
    }
}

pub fn render_details(reminder: &Reminder) -> String {
    let mut parts = Vec::new();
    if reminder.priority != Priority::Medium {
        parts.push(format!("!{}", reminder.priority));
    }
    if let Some(category) = reminder.category.as_deref() {
        parts.push(format!("@{category}"));
    }
    if let Some(minutes) = reminder.repeat_minutes {
        parts.push(format!("every {}", format_minutes(i64::from(minutes))));
    }
    for kind in AttachmentKind::ALL {
        match reminder.attachment(kind) {
            Some(attachment) if attachment.is_pending() => parts.push(format!("{kind}*")),
            Some(_) => parts.push(kind.to_string()),
            None => {}
        }
    }
    parts.join(" ")
}

/// Human label for a due time: `in 5m`, `2h ago`, `now`.
pub fn format_relative_due(due_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = (due_at - now).num_minutes();
    if diff == 0 {
        "now".to_string()
    } else if diff > 0 {
        format!("in {}", format_minutes(diff))
    } else {
        format!("{} ago", format_minutes(diff.saturating_abs()))
    }
}

fn format_minutes(minutes: i64) -> String {
    let hour = 60;
    let day = 24 * hour;
    let week = 7 * day;
    let year = 365 * day;

    if minutes < hour {
        format!("{minutes}m")
    } else if minutes < day {
        format!("{}h", minutes / hour)
    } else if minutes < week {
        format!("{}d", minutes / day)
    } else if minutes < year {
        format!("{}w", minutes / week)
    } else {
        format!("{}y", minutes / year)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated = text
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

#[derive(Clone, Copy)]
pub enum SyncMode {
    /// Fall back to local-only when sync is off or unavailable
    Optional,
    /// Fail with a descriptive error instead
    Required,
}

impl SyncMode {
    const fn requires_sync(self) -> bool {
        matches!(self, Self::Required)
    }
}

/// Firebase settings plus a restored, signed-in session.
pub struct SyncCredentials {
    pub config: FirebaseConfig,
    pub auth: AuthClient,
    pub session: AuthSession,
}

/// A started sync session plus what `watch` needs to keep its token fresh.
pub struct ConnectedSync {
    pub session: CliSyncSession,
    pub remote: FirestoreCollection,
    pub auth: AuthClient,
    pub auth_session: AuthSession,
}

pub async fn load_credentials(mode: SyncMode) -> Result<Option<SyncCredentials>, CliError> {
    let Some(config) = FirebaseConfig::from_env()? else {
        if mode.requires_sync() {
            return Err(CliError::SyncNotConfigured);
        }
        tracing::warn!("Sync is enabled but Firebase is not configured; changes stay local");
        return Ok(None);
    };

    let auth = auth_client(&config).map_err(|error| CliError::Auth(error.to_string()))?;
    let session = auth
        .restore_session()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?;
    let Some(session) = session else {
        if mode.requires_sync() {
            return Err(CliError::NotSignedIn);
        }
        tracing::warn!("Sync is enabled but no account is signed in; changes stay local");
        return Ok(None);
    };

    Ok(Some(SyncCredentials {
        config,
        auth,
        session,
    }))
}

/// Build a sync session for the signed-in account.
///
/// With an observer the session also listens for remote changes; without
/// one it only writes, so one-shot commands never open a listener.
pub fn connect(
    store: &LocalStore,
    credentials: SyncCredentials,
    observer: Option<SharedObserver>,
) -> Result<ConnectedSync, CliError> {
    let SyncCredentials {
        config,
        auth,
        session: auth_session,
    } = credentials;

    let remote = FirestoreCollection::new(config, auth_session.id_token.clone())?;
    let blobs = R2Config::from_env()?.map(R2Storage::new);
    if blobs.is_none() {
        tracing::debug!("R2 is not configured; attachment uploads will fail");
    }

    let mut session = SyncSession::new(remote.clone(), blobs, store.clone());
    let identity = Some(auth_session.identity());
    if observer.is_some() {
        session.set_observer(observer);
        session.start(identity)?;
    } else {
        session.start_writes_only(identity)?;
    }

    Ok(ConnectedSync {
        session,
        remote,
        auth,
        auth_session,
    })
}

/// Start a write-only sync session when the user turned sync on.
pub async fn connect_sync(
    store: &LocalStore,
    mode: SyncMode,
) -> Result<Option<ConnectedSync>, CliError> {
    let settings = store.load_settings().await?;
    if !settings.sync_enabled {
        if mode.requires_sync() {
            return Err(CliError::SyncDisabled);
        }
        return Ok(None);
    }

    let Some(credentials) = load_credentials(mode).await? else {
        return Ok(None);
    };
    connect(store, credentials, None).map(Some)
}

/// Push a reminder that was just saved locally.
///
/// Stores the pushed copy back so uploaded attachment URLs are kept.
pub async fn push_saved(
    store: &LocalStore,
    reminder: &Reminder,
    is_new: bool,
) -> Result<(), CliError> {
    let Some(connected) = connect_sync(store, SyncMode::Optional).await? else {
        return Ok(());
    };

    let outcome = if is_new {
        connected.session.create(reminder).await
    } else {
        connected.session.update(reminder).await
    }
    .map_err(|source| CliError::PushFailed {
        id: reminder.id.to_string(),
        source,
    })?;

    if let WriteOutcome::Written(sent) = outcome {
        store.upsert_reminder(&sent).await?;
    }
    Ok(())
}

/// Delete a reminder remotely after it was removed locally.
pub async fn push_deleted(store: &LocalStore, id: &ReminderId) -> Result<(), CliError> {
    let Some(connected) = connect_sync(store, SyncMode::Optional).await? else {
        return Ok(());
    };

    connected
        .session
        .delete(id)
        .await
        .map_err(|source| CliError::PushFailed {
            id: id.to_string(),
            source,
        })?;
    Ok(())
}
