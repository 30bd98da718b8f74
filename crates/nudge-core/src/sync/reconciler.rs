//! Applies remote change batches to the local store.

use crate::models::{ChangeRecord, Reminder, ReminderId};
use crate::store::LocalStore;
use crate::Result;

/// Receiver for list updates caused by remote changes.
///
/// Every method defaults to a no-op, so implementors only override what they
/// display.
pub trait ReminderObserver {
    fn inserted(&self, _reminder: &Reminder) {}
    fn updated(&self, _reminder: &Reminder) {}
    fn removed(&self, _id: &ReminderId) {}
}

/// Per-batch tally of what the reconciler did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    /// Records that left the store unchanged
    pub skipped: usize,
}

impl ApplyReport {
    /// Whether any record changed the store.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.inserted + self.updated + self.removed > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Inserted,
    Updated,
    Removed,
    Unchanged,
}

/// Applies change records, one snapshot write per record.
pub struct Reconciler<'a> {
    store: &'a LocalStore,
    observer: Option<&'a dyn ReminderObserver>,
}

impl<'a> Reconciler<'a> {
    #[must_use]
    pub const fn new(store: &'a LocalStore) -> Self {
        Self {
            store,
            observer: None,
        }
    }

    #[must_use]
    pub const fn with_observer(mut self, observer: Option<&'a dyn ReminderObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Apply a batch in order.
    ///
    /// The snapshot is persisted after every record, so an interrupted batch
    /// leaves the store at a consistent prefix of the batch.
    pub async fn apply_batch(&self, batch: &[ChangeRecord]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        for record in batch {
            match self.apply(record).await? {
                Applied::Inserted => report.inserted += 1,
                Applied::Updated => report.updated += 1,
                Applied::Removed => report.removed += 1,
                Applied::Unchanged => report.skipped += 1,
            }
        }

        tracing::debug!(
            "Applied remote batch: {} inserted, {} updated, {} removed, {} skipped",
            report.inserted,
            report.updated,
            report.removed,
            report.skipped
        );
        Ok(report)
    }

    async fn apply(&self, record: &ChangeRecord) -> Result<Applied> {
        match record {
            ChangeRecord::Added(reminder) => {
                let inserted = self
                    .store
                    .mutate(|reminders| {
                        if reminders.iter().any(|r| r.id == reminder.id) {
                            return Ok(false);
                        }
                        reminders.push(reminder.clone());
                        Ok(true)
                    })
                    .await?;

                if !inserted {
                    return Ok(Applied::Unchanged);
                }
                if let Some(observer) = self.observer {
                    observer.inserted(reminder);
                }
                Ok(Applied::Inserted)
            }
            ChangeRecord::Modified(reminder) => {
                let updated = self
                    .store
                    .mutate(|reminders| {
                        let Some(existing) = reminders.iter_mut().find(|r| r.id == reminder.id)
                        else {
                            return Ok(false);
                        };
                        *existing = reminder.clone();
                        Ok(true)
                    })
                    .await?;

                if !updated {
                    tracing::debug!("Dropping modification for unknown reminder {}", reminder.id);
                    return Ok(Applied::Unchanged);
                }
                if let Some(observer) = self.observer {
                    observer.updated(reminder);
                }
                Ok(Applied::Updated)
            }
            ChangeRecord::Removed(document) => {
                let removed = self.store.remove_reminder(&document.id).await?;
                if let Some(observer) = self.observer {
                    observer.removed(&document.id);
                }
                Ok(if removed.is_some() {
                    Applied::Removed
                } else {
                    Applied::Unchanged
                })
            }
        }
    }
}
