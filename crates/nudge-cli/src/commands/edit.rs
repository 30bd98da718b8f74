use std::path::Path;

use chrono::Utc;

use crate::cli::ReminderFields;
use crate::commands::common::{
    apply_fields, normalize_reminder_identifier, normalize_title, open_store, parse_due,
    push_saved, resolve_reminder,
};
use crate::error::CliError;

/// Changes requested by `nudge edit`.
pub struct EditRequest {
    pub title: Option<String>,
    pub at: Option<String>,
    pub no_repeat: bool,
    pub fields: ReminderFields,
}

impl EditRequest {
    const fn is_empty(&self) -> bool {
        self.title.is_none() && self.at.is_none() && !self.no_repeat && self.fields.is_empty()
    }
}

pub async fn run_edit(id: &str, request: EditRequest, db_path: &Path) -> Result<(), CliError> {
    if request.is_empty() {
        return Err(CliError::NothingToEdit);
    }

    let normalized_id = normalize_reminder_identifier(id)?;
    let store = open_store(db_path)?;
    let mut reminder = resolve_reminder(&normalized_id, &store).await?;
    let original = reminder.clone();

    if let Some(title) = request.title.as_deref() {
        reminder.title = normalize_title(title)?;
    }
    if let Some(at) = request.at.as_deref() {
        reminder.due_at = parse_due(at, Utc::now())?;
        reminder.completed = false;
    }
    if request.no_repeat {
        reminder.repeat_minutes = None;
    }
    apply_fields(&mut reminder, request.fields)?;

    if reminder == original {
        println!("{}", reminder.id);
        return Ok(());
    }

    reminder.touch();
    store.upsert_reminder(&reminder).await?;
    push_saved(&store, &reminder, false).await?;

    println!("{}", reminder.id);
    Ok(())
}
