//! Local reminder store
//!
//! Reminders are persisted as a single JSON snapshot under the `reminders`
//! key. Every mutation reads the snapshot, changes it in memory, and replaces
//! the stored value in one statement, so a crash never leaves a half-written
//! reminder behind.

mod connection;
mod migrations;
mod repository;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

pub use connection::Database;
pub use repository::{KeyValueRepository, SqliteKeyValueRepository};

use crate::models::{Reminder, ReminderId, Settings};
use crate::{Error, Result};

/// Key holding the JSON array of reminders
pub const REMINDERS_KEY: &str = "reminders";
/// Key holding the serialized [`Settings`]
pub const SETTINGS_KEY: &str = "settings";

/// Shared handle to the on-device reminder snapshot.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path, creating parent directories.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Mutex::new(Database::open_in_memory()?)),
            db_path: None,
        })
    }

    /// Filesystem location, if the store is file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Load the full reminder snapshot (empty when nothing was saved yet).
    pub async fn load_reminders(&self) -> Result<Vec<Reminder>> {
        let db = self.db.lock().await;
        let repo = SqliteKeyValueRepository::new(db.connection());
        Ok(repo.get_json(REMINDERS_KEY)?.unwrap_or_default())
    }

    /// Replace the full reminder snapshot.
    pub async fn save_reminders(&self, reminders: &[Reminder]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteKeyValueRepository::new(db.connection());
        repo.put_json(REMINDERS_KEY, reminders)
    }

    /// Fetch a reminder by id.
    pub async fn get_reminder(&self, id: &ReminderId) -> Result<Option<Reminder>> {
        let reminders = self.load_reminders().await?;
        Ok(reminders.into_iter().find(|reminder| &reminder.id == id))
    }

    /// List reminders ordered by due time.
    pub async fn list_reminders(&self, include_completed: bool) -> Result<Vec<Reminder>> {
        let mut reminders = self.load_reminders().await?;
        if !include_completed {
            reminders.retain(|reminder| !reminder.completed);
        }
        reminders.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        Ok(reminders)
    }

    /// Insert a reminder, or replace the one with the same id.
    pub async fn upsert_reminder(&self, reminder: &Reminder) -> Result<()> {
        self.mutate(|reminders| {
            match reminders.iter_mut().find(|r| r.id == reminder.id) {
                Some(existing) => *existing = reminder.clone(),
                None => reminders.push(reminder.clone()),
            }
            Ok(())
        })
        .await
    }

    /// Complete a reminder (or advance a repeating one) and return the new state.
    pub async fn complete_reminder(&self, id: &ReminderId) -> Result<Reminder> {
        self.mutate(|reminders| {
            let reminder = reminders
                .iter_mut()
                .find(|r| &r.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            reminder.complete(Utc::now());
            Ok(reminder.clone())
        })
        .await
    }

    /// Remove a reminder, returning it when it existed.
    pub async fn remove_reminder(&self, id: &ReminderId) -> Result<Option<Reminder>> {
        self.mutate(|reminders| {
            Ok(reminders
                .iter()
                .position(|r| &r.id == id)
                .map(|position| reminders.remove(position)))
        })
        .await
    }

    /// Load settings, falling back to defaults.
    pub async fn load_settings(&self) -> Result<Settings> {
        let db = self.db.lock().await;
        let repo = SqliteKeyValueRepository::new(db.connection());
        Ok(repo.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    /// Save settings.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteKeyValueRepository::new(db.connection());
        repo.put_json(SETTINGS_KEY, settings)
    }

    /// Read-modify-write of the snapshot under a single lock.
    ///
    /// Nothing is written when `apply` fails.
    pub async fn mutate<T, F>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Reminder>) -> Result<T>,
    {
        let db = self.db.lock().await;
        let repo = SqliteKeyValueRepository::new(db.connection());
        let mut reminders: Vec<Reminder> = repo.get_json(REMINDERS_KEY)?.unwrap_or_default();
        let output = apply(&mut reminders)?;
        repo.put_json(REMINDERS_KEY, &reminders)?;
        Ok(output)
    }
}
