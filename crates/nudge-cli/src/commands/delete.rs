use std::path::Path;

use crate::commands::common::{
    normalize_reminder_identifier, open_store, push_deleted, resolve_reminder,
};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_reminder_identifier(id)?;
    let store = open_store(db_path)?;
    let reminder = resolve_reminder(&normalized_id, &store).await?;

    store.remove_reminder(&reminder.id).await?;
    push_deleted(&store, &reminder.id).await?;

    println!("{}", reminder.id);
    Ok(())
}
