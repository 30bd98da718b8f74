use std::path::Path;

use chrono::Utc;
use nudge_core::Reminder;

use crate::cli::ReminderFields;
use crate::commands::common::{apply_fields, normalize_title, open_store, parse_due, push_saved};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    at: &str,
    fields: ReminderFields,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = normalize_title(&title_parts.join(" "))?;
    let due_at = parse_due(at, Utc::now())?;

    let mut reminder = Reminder::new(title, due_at);
    apply_fields(&mut reminder, fields)?;

    let store = open_store(db_path)?;
    store.upsert_reminder(&reminder).await?;
    push_saved(&store, &reminder, true).await?;

    println!("{}", reminder.id);
    Ok(())
}
