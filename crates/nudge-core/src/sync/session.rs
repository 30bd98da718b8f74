//! Sync session: owns the subscription and the enabled flag.

use std::sync::Arc;

use crate::models::{Reminder, ReminderId};
use crate::remote::{BlobStorage, RemoteCollection};
use crate::store::LocalStore;
use crate::{Error, Result};

use super::reconciler::{ApplyReport, Reconciler, ReminderObserver};
use super::resync::{self, ResyncReport};
use super::subscription::{ListenerEvent, Subscription};
use super::Writer;

/// Signed-in user the session syncs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
        }
    }
}

/// Result of a write attempted through the session.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// Sync is disabled; nothing was sent
    Skipped,
    /// The remote collection accepted the write
    Written(T),
}

impl<T> WriteOutcome<T> {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// Shared observer handle for reconciled changes.
pub type SharedObserver = Arc<dyn ReminderObserver + Send + Sync>;

/// Coordinates sync for one local store.
///
/// Writes are gated on the enabled flag, so a stopped session leaves the app
/// fully usable offline.
pub struct SyncSession<R, B> {
    remote: R,
    blobs: B,
    store: LocalStore,
    identity: Option<Identity>,
    enabled: bool,
    subscription: Option<Subscription>,
    observer: Option<SharedObserver>,
}

impl<R: RemoteCollection, B: BlobStorage> SyncSession<R, B> {
    pub const fn new(remote: R, blobs: B, store: LocalStore) -> Self {
        Self {
            remote,
            blobs,
            store,
            identity: None,
            enabled: false,
            subscription: None,
            observer: None,
        }
    }

    /// Register the observer notified about reconciled changes.
    pub fn set_observer(&mut self, observer: Option<SharedObserver>) {
        self.observer = observer;
    }

    /// Start syncing for `identity`, replacing any open subscription.
    pub fn start(&mut self, identity: Option<Identity>) -> Result<()> {
        let Some(identity) = identity else {
            return Err(Error::NotAuthenticated);
        };

        self.stop();
        let subscription = self
            .remote
            .subscribe(&identity.user_id)
            .map_err(|error| match error {
                Error::Listener(_) => error,
                other => Error::Listener(other.to_string()),
            })?;

        tracing::info!("Sync started for user {}", identity.user_id);
        self.subscription = Some(subscription);
        self.identity = Some(identity);
        self.enabled = true;
        Ok(())
    }

    /// Enable writes for `identity` without listening for remote changes.
    ///
    /// For one-shot pushes that exit before any batch would arrive.
    pub fn start_writes_only(&mut self, identity: Option<Identity>) -> Result<()> {
        let Some(identity) = identity else {
            return Err(Error::NotAuthenticated);
        };

        self.stop();
        tracing::debug!("Sync writes enabled for user {}", identity.user_id);
        self.identity = Some(identity);
        self.enabled = true;
        Ok(())
    }

    /// Stop syncing. Safe to call when already stopped.
    pub fn stop(&mut self) {
        self.close_subscription();
        if self.enabled {
            tracing::info!("Sync stopped");
        }
        self.enabled = false;
        self.identity = None;
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the change listener is still delivering.
    pub fn is_listening(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_open)
    }

    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub const fn store(&self) -> &LocalStore {
        &self.store
    }

    /// Wait for the next remote batch and apply it to the local store.
    ///
    /// Returns `Ok(None)` when no subscription is open. A listener failure
    /// closes the subscription; it is not restarted automatically.
    pub async fn next_batch(&mut self) -> Result<Option<ApplyReport>> {
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(None);
        };

        let message = match subscription.next_event().await {
            Some(ListenerEvent::Batch(batch)) => {
                let observer = self
                    .observer
                    .as_deref()
                    .map(|observer| observer as &dyn ReminderObserver);
                let report = Reconciler::new(&self.store)
                    .with_observer(observer)
                    .apply_batch(&batch)
                    .await?;
                return Ok(Some(report));
            }
            Some(ListenerEvent::Failed(message)) => message,
            None => "subscription ended".to_string(),
        };

        tracing::warn!("Sync listener stopped: {message}");
        self.close_subscription();
        Err(Error::Listener(message))
    }

    /// Push a newly created reminder.
    pub async fn create(&self, reminder: &Reminder) -> Result<WriteOutcome<Reminder>> {
        let Some(writer) = self.writer() else {
            tracing::warn!("Sync disabled; reminder {} stays local", reminder.id);
            return Ok(WriteOutcome::Skipped);
        };
        writer.create(reminder).await.map(WriteOutcome::Written)
    }

    /// Push an edit to an existing reminder.
    pub async fn update(&self, reminder: &Reminder) -> Result<WriteOutcome<Reminder>> {
        let Some(writer) = self.writer() else {
            tracing::warn!("Sync disabled; edit to {} stays local", reminder.id);
            return Ok(WriteOutcome::Skipped);
        };
        writer.update(reminder).await.map(WriteOutcome::Written)
    }

    /// Delete a reminder and its attachments remotely.
    pub async fn delete(&self, id: &ReminderId) -> Result<WriteOutcome<()>> {
        let Some(writer) = self.writer() else {
            tracing::warn!("Sync disabled; deletion of {id} stays local");
            return Ok(WriteOutcome::Skipped);
        };
        writer.delete(id).await.map(WriteOutcome::Written)
    }

    /// Push every local reminder to the remote collection.
    pub async fn resync(&self) -> Result<ResyncReport> {
        let writer = self.writer().ok_or(Error::NotAuthenticated)?;
        resync::push_all(&writer, &self.store).await
    }

    fn writer(&self) -> Option<Writer<'_, R, B>> {
        if !self.enabled {
            return None;
        }
        let identity = self.identity.as_ref()?;
        Some(Writer::new(&self.remote, &self.blobs, &identity.user_id))
    }

    fn close_subscription(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::models::AttachmentRef;
    use crate::remote::memory::{MemoryBlobStorage, MemoryCollection};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    type TestSession = SyncSession<MemoryCollection, MemoryBlobStorage>;

    fn session() -> (TestSession, MemoryCollection, MemoryBlobStorage) {
        let remote = MemoryCollection::new();
        let blobs = MemoryBlobStorage::new();
        let store = LocalStore::open_in_memory().unwrap();
        (
            SyncSession::new(remote.clone(), blobs.clone(), store),
            remote,
            blobs,
        )
    }

    fn reminder(title: &str) -> Reminder {
        Reminder::new(title, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap())
    }

    fn without_server_fields(mut reminder: Reminder) -> Reminder {
        reminder.created_at = None;
        reminder.updated_at = None;
        reminder
    }

    #[derive(Default)]
    struct Recorder {
        inserted: Mutex<Vec<ReminderId>>,
    }

    impl ReminderObserver for Recorder {
        fn inserted(&self, reminder: &Reminder) {
            self.inserted.lock().unwrap().push(reminder.id.clone());
        }
    }

    #[tokio::test]
    async fn start_without_identity_is_rejected() {
        let (mut session, remote, _) = session();
        assert!(matches!(session.start(None), Err(Error::NotAuthenticated)));
        assert!(!session.is_enabled());
        assert_eq!(remote.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn disabled_session_never_contacts_remote() {
        let (session, remote, blobs) = session();
        let item = reminder("Offline");
        session.store().upsert_reminder(&item).await.unwrap();

        assert!(session.create(&item).await.unwrap().is_skipped());
        assert!(session.update(&item).await.unwrap().is_skipped());
        assert!(session.delete(&item.id).await.unwrap().is_skipped());

        assert_eq!(remote.write_count(), 0);
        assert!(remote.documents("u1").is_empty());
        assert!(blobs.keys().is_empty());
        assert_eq!(session.store().load_reminders().await.unwrap(), vec![item]);
    }

    #[tokio::test]
    async fn restart_replaces_the_subscription() {
        let (mut session, remote, _) = session();
        session.start(Some(Identity::new("u1"))).unwrap();
        session.start(Some(Identity::new("u1"))).unwrap();
        assert_eq!(remote.subscriber_count(), 1);

        session.stop();
        session.stop();
        assert!(!session.is_enabled());
        assert_eq!(remote.subscriber_count(), 0);
        assert_eq!(session.next_batch().await.unwrap(), None);
    }

    #[tokio::test]
    async fn created_reminder_round_trips_through_listener() {
        let (mut session, _, _) = session();
        let recorder = Arc::new(Recorder::default());
        session.set_observer(Some(recorder.clone()));
        session.start(Some(Identity::new("u1"))).unwrap();

        let mut original = reminder("Round trip");
        original.owner_id = Some("u1".to_string());
        original
            .extra
            .insert("caregiverNote".to_string(), serde_json::json!("blue can"));
        let outcome = session.create(&original).await.unwrap();
        assert!(matches!(outcome, WriteOutcome::Written(_)));

        let report = session.next_batch().await.unwrap().unwrap();
        assert_eq!(report.inserted, 1);

        let stored = session.store().get_reminder(&original.id).await.unwrap().unwrap();
        assert_eq!(without_server_fields(stored), without_server_fields(original.clone()));
        assert_eq!(*recorder.inserted.lock().unwrap(), vec![original.id]);
    }

    #[tokio::test]
    async fn initial_snapshot_populates_fresh_device() {
        let (mut session, remote, blobs) = session();
        let existing = reminder("From phone");
        Writer::new(&remote, &blobs, "u1").create(&existing).await.unwrap();

        session.start(Some(Identity::new("u1"))).unwrap();
        session.next_batch().await.unwrap();

        let local = session.store().load_reminders().await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, existing.id);
    }

    #[tokio::test]
    async fn remote_edits_overwrite_local_copy() {
        let (mut session, remote, blobs) = session();
        let mut item = reminder("Original");
        session.store().upsert_reminder(&item).await.unwrap();
        session.start(Some(Identity::new("u1"))).unwrap();
        session.create(&item).await.unwrap();
        session.next_batch().await.unwrap();

        item.title = "Edited elsewhere".to_string();
        Writer::new(&remote, &blobs, "u1").update(&item).await.unwrap();
        let report = session.next_batch().await.unwrap().unwrap();

        assert_eq!(report.updated, 1);
        let stored = session.store().get_reminder(&item.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Edited elsewhere");
    }

    #[tokio::test]
    async fn remote_delete_removes_local_copy() {
        let (mut session, remote, _) = session();
        let item = reminder("Delete me");
        session.store().upsert_reminder(&item).await.unwrap();
        session.start(Some(Identity::new("u1"))).unwrap();
        session.create(&item).await.unwrap();
        session.next_batch().await.unwrap();

        session.delete(&item.id).await.unwrap();
        let report = session.next_batch().await.unwrap().unwrap();

        assert_eq!(report.removed, 1);
        assert!(remote.documents("u1").is_empty());
        assert!(session.store().load_reminders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listener_failure_closes_subscription_but_keeps_writes_enabled() {
        let (mut session, remote, _) = session();
        session.start(Some(Identity::new("u1"))).unwrap();
        remote.break_listeners("u1");

        assert!(matches!(session.next_batch().await, Err(Error::Listener(_))));
        assert!(!session.is_listening());
        assert!(session.is_enabled());
        assert_eq!(session.next_batch().await.unwrap(), None);

        let outcome = session.create(&reminder("Still pushed")).await.unwrap();
        assert!(!outcome.is_skipped());
    }

    #[tokio::test]
    async fn failed_subscribe_leaves_session_disabled() {
        let (mut session, remote, _) = session();
        remote.fail_subscription(true);
        assert!(matches!(
            session.start(Some(Identity::new("u1"))),
            Err(Error::Listener(_))
        ));
        assert!(!session.is_enabled());
    }

    #[tokio::test]
    async fn upload_failure_aborts_create() {
        let (mut session, remote, blobs) = session();
        session.start(Some(Identity::new("u1"))).unwrap();
        blobs.fail_uploads(true);

        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("p.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        let mut item = reminder("With photo");
        item.photo = Some(AttachmentRef::pending(&photo));

        assert!(matches!(session.create(&item).await, Err(Error::Upload(_))));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn resync_counts_failures_independently() {
        let (mut session, remote, _) = session();
        let items = [reminder("one"), reminder("two"), reminder("three")];
        session.store().save_reminders(&items).await.unwrap();
        remote.fail_writes_for(&items[1].id);

        assert!(matches!(session.resync().await, Err(Error::NotAuthenticated)));

        session.start(Some(Identity::new("u1"))).unwrap();
        let report = session.resync().await.unwrap();
        assert_eq!(report, ResyncReport { synced: 2, errors: 1 });
        assert_eq!(remote.documents("u1").len(), 2);

        // Echoed "added" records for reminders already held locally change nothing
        let applied = session.next_batch().await.unwrap().unwrap();
        assert_eq!(applied.inserted, 0);
        assert_eq!(session.store().load_reminders().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn resync_stores_uploaded_photo_url() {
        let (mut session, remote, blobs) = session();
        let tmp = tempfile::tempdir().unwrap();
        let photo = tmp.path().join("p.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();
        let mut item = reminder("With photo");
        item.photo = Some(AttachmentRef::pending(&photo));
        session.store().upsert_reminder(&item).await.unwrap();

        session.start(Some(Identity::new("u1"))).unwrap();
        session.resync().await.unwrap();
        assert_eq!(blobs.keys().len(), 1);

        let stored = session.store().get_reminder(&item.id).await.unwrap().unwrap();
        assert!(!stored.has_pending_attachments());
        assert_eq!(stored.photo, remote.document("u1", &item.id).unwrap().photo);

        blobs.fail_uploads(true);
        let again = session.resync().await.unwrap();
        assert_eq!(again, ResyncReport { synced: 1, errors: 0 });
        assert_eq!(blobs.keys().len(), 1);
    }

    #[tokio::test]
    async fn writes_only_start_pushes_without_listening() {
        let (mut session, remote, _) = session();
        assert!(matches!(
            session.start_writes_only(None),
            Err(Error::NotAuthenticated)
        ));

        remote.fail_subscription(true);
        session.start_writes_only(Some(Identity::new("u1"))).unwrap();
        assert!(session.is_enabled());
        assert!(!session.is_listening());
        assert_eq!(remote.subscriber_count(), 0);

        let item = reminder("One shot");
        assert!(!session.create(&item).await.unwrap().is_skipped());
        assert!(remote.document("u1", &item.id).is_some());
        assert_eq!(session.next_batch().await.unwrap(), None);

        session.stop();
        assert!(!session.is_enabled());
    }
}
