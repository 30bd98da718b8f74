use std::path::Path;

use crate::commands::common::{
    format_relative_due, normalize_reminder_identifier, open_store, push_saved, resolve_reminder,
};
use crate::error::CliError;

pub async fn run_done(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_reminder_identifier(id)?;
    let store = open_store(db_path)?;
    let reminder = resolve_reminder(&normalized_id, &store).await?;

    let completed = store.complete_reminder(&reminder.id).await?;
    push_saved(&store, &completed, false).await?;

    if completed.completed {
        println!("{}", completed.id);
    } else {
        println!(
            "{} next due {}",
            completed.id,
            format_relative_due(completed.due_at, chrono::Utc::now())
        );
    }
    Ok(())
}
