use std::path::Path;

use nudge_core::models::AppMode;

use crate::commands::common::open_store;
use crate::error::CliError;

/// Print the active mode, or switch to `mode` when given.
pub async fn run_mode(mode: Option<AppMode>, db_path: &Path) -> Result<AppMode, CliError> {
    let store = open_store(db_path)?;
    let mut settings = store.load_settings().await?;

    if let Some(mode) = mode {
        if settings.mode != mode {
            settings.mode = mode;
            store.save_settings(&settings).await?;
            tracing::info!("Switched to {mode} mode");
        }
    }

    println!("{}", settings.mode);
    Ok(settings.mode)
}
