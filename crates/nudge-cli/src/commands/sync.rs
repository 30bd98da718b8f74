use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nudge_core::auth::SessionPersistence;
use nudge_core::config::FirebaseConfig;
use nudge_core::models::Reminder;
use nudge_core::remote::R2Config;
use nudge_core::store::LocalStore;
use nudge_core::sync::{ReminderObserver, ResyncReport};
use nudge_core::ReminderId;

use crate::auth::SessionStore;
use crate::cli::SyncCommands;
use crate::commands::common::{
    connect, connect_sync, format_relative_due, load_credentials, open_store, short_id,
    ConnectedSync, SyncMode,
};
use crate::error::CliError;

/// Firebase ID tokens live for an hour; refresh well before that.
const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(45 * 60);

pub async fn run_sync(command: SyncCommands, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    match command {
        SyncCommands::Status => run_status(&store).await,
        SyncCommands::Enable => run_enable(&store).await,
        SyncCommands::Disable => run_disable(&store).await,
        SyncCommands::Push => run_push(&store).await,
        SyncCommands::Watch => run_watch(&store).await,
    }
}

async fn run_status(store: &LocalStore) -> Result<(), CliError> {
    let settings = store.load_settings().await?;
    let reminders = store.load_reminders().await?;
    let pending = reminders
        .iter()
        .filter(|reminder| reminder.has_pending_attachments())
        .count();

    if let Some(path) = store.path() {
        println!("Database:     {}", path.display());
    }
    println!("Mode:         {}", settings.mode);
    println!(
        "Sync:         {}",
        if settings.sync_enabled { "enabled" } else { "disabled" }
    );
    println!("Reminders:    {} ({pending} with attachments awaiting upload)", reminders.len());

    let Some(config) = FirebaseConfig::from_env()? else {
        println!("Firebase:     not configured");
        return Ok(());
    };
    println!("Firebase:     {}", config.project_id);
    println!(
        "Attachments:  {}",
        if R2Config::from_env()?.is_some() { "R2" } else { "not configured" }
    );

    let session = SessionStore::new(&config.project_id)
        .load_session()
        .map_err(|error| CliError::Auth(error.to_string()))?;
    match session {
        Some(session) => {
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Account:      {email_label}");
        }
        None => println!("Account:      not signed in"),
    }
    Ok(())
}

async fn run_enable(store: &LocalStore) -> Result<(), CliError> {
    let credentials = load_credentials(SyncMode::Required)
        .await?
        .ok_or(CliError::NotSignedIn)?;

    let mut settings = store.load_settings().await?;
    settings.sync_enabled = true;
    store.save_settings(&settings).await?;

    let connected = connect(store, credentials, None)?;
    println!("Sync enabled");
    let report = connected.session.resync().await?;
    print_report(report);
    Ok(())
}

async fn run_disable(store: &LocalStore) -> Result<(), CliError> {
    let mut settings = store.load_settings().await?;
    if !settings.sync_enabled {
        println!("Sync is already disabled");
        return Ok(());
    }

    settings.sync_enabled = false;
    store.save_settings(&settings).await?;
    println!("Sync disabled; reminders stay on this device");
    Ok(())
}

async fn run_push(store: &LocalStore) -> Result<(), CliError> {
    let connected = connect_sync(store, SyncMode::Required)
        .await?
        .ok_or(CliError::SyncNotConfigured)?;
    let report = connected.session.resync().await?;
    print_report(report);
    Ok(())
}

async fn run_watch(store: &LocalStore) -> Result<(), CliError> {
    let settings = store.load_settings().await?;
    if !settings.sync_enabled {
        return Err(CliError::SyncDisabled);
    }
    let credentials = load_credentials(SyncMode::Required)
        .await?
        .ok_or(CliError::NotSignedIn)?;

    let ConnectedSync {
        mut session,
        remote,
        auth,
        mut auth_session,
    } = connect(store, credentials, Some(Arc::new(PrintObserver)))?;

    println!("Watching for remote changes (Ctrl-C to stop)");
    let mut refresh = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
    refresh.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.stop();
                println!("Stopped");
                return Ok(());
            }
            _ = refresh.tick() => {
                auth_session = auth
                    .refresh_session(&auth_session)
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?;
                remote.set_id_token(auth_session.id_token.clone());
                tracing::debug!("Refreshed Firebase ID token");
            }
            batch = session.next_batch() => {
                match batch? {
                    Some(report) if report.changed() => {
                        tracing::debug!("Applied remote batch: {report:?}");
                    }
                    Some(_) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}

fn print_report(report: ResyncReport) {
    if report.errors == 0 {
        println!("Pushed {} reminders", report.synced);
    } else {
        println!(
            "Pushed {} reminders, {} failed (see warnings above)",
            report.synced, report.errors
        );
    }
}

/// Prints each reconciled change as it is applied.
struct PrintObserver;

impl ReminderObserver for PrintObserver {
    fn inserted(&self, reminder: &Reminder) {
        println!("+ {}", describe(reminder));
    }

    fn updated(&self, reminder: &Reminder) {
        println!("~ {}", describe(reminder));
    }

    fn removed(&self, id: &ReminderId) {
        println!("- {}", short_id(id));
    }
}

fn describe(reminder: &Reminder) -> String {
    format!(
        "{}  {}  ({})",
        short_id(&reminder.id),
        reminder.title,
        format_relative_due(reminder.due_at, chrono::Utc::now())
    )
}
