//! In-process remote backends.
//!
//! These behave like the hosted services closely enough to exercise the sync
//! engine without a network: merge writes keep remote-only fields, server
//! timestamps are assigned on write, and subscribers see an initial snapshot
//! followed by one batch per write. Failures can be injected per operation.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::models::{ChangeRecord, Reminder, ReminderId};
use crate::sync::{self, BatchSender, Subscription};
use crate::{Error, Result};

use super::{BlobStorage, RemoteCollection};

#[derive(Default)]
struct CollectionState {
    documents: BTreeMap<String, BTreeMap<ReminderId, Reminder>>,
    subscribers: Vec<(String, BatchSender)>,
    failing_ids: HashSet<ReminderId>,
    fail_all_writes: bool,
    fail_subscribe: bool,
    write_count: usize,
}

impl CollectionState {
    fn check_write(&self, id: &ReminderId) -> Result<()> {
        if self.fail_all_writes || self.failing_ids.contains(id) {
            return Err(Error::RemoteWrite(format!("injected failure for {id}")));
        }
        Ok(())
    }

    fn publish(&mut self, owner_id: &str, record: ChangeRecord) {
        self.subscribers.retain(|(_, sender)| !sender.is_closed());
        for (owner, sender) in &self.subscribers {
            if owner == owner_id {
                sender.send_batch(vec![record.clone()]);
            }
        }
    }
}

/// In-memory document collection shared by clones.
#[derive(Clone, Default)]
pub struct MemoryCollection {
    state: Arc<Mutex<CollectionState>>,
}

impl MemoryCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every write touching `id` fail.
    pub fn fail_writes_for(&self, id: &ReminderId) {
        self.lock().failing_ids.insert(id.clone());
    }

    /// Make every write fail (or succeed again).
    pub fn fail_all_writes(&self, fail: bool) {
        self.lock().fail_all_writes = fail;
    }

    /// Make the next `subscribe` calls fail.
    pub fn fail_subscription(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    /// Report a listener failure to every subscriber of `owner_id` and drop them.
    pub fn break_listeners(&self, owner_id: &str) {
        let mut state = self.lock();
        state.subscribers.retain(|(owner, sender)| {
            if owner == owner_id {
                sender.send_failure("listener connection lost");
                false
            } else {
                true
            }
        });
    }

    /// Number of successful writes (set, update and delete).
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|(_, sender)| !sender.is_closed());
        state.subscribers.len()
    }

    /// Current documents for an owner, ordered by due time.
    pub fn documents(&self, owner_id: &str) -> Vec<Reminder> {
        let state = self.lock();
        let mut documents: Vec<Reminder> = state
            .documents
            .get(owner_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        documents
    }

    pub fn document(&self, owner_id: &str, id: &ReminderId) -> Option<Reminder> {
        self.lock()
            .documents
            .get(owner_id)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    /// Store `incoming` over `existing`, keeping remote-only fields.
    fn write(state: &mut CollectionState, owner_id: &str, incoming: &Reminder) -> ChangeRecord {
        let now = Utc::now();
        let documents = state.documents.entry(owner_id.to_string()).or_default();
        let previous = documents.remove(&incoming.id);

        let mut document = incoming.clone();
        document.updated_at = Some(now);
        let record = match previous {
            Some(previous) => {
                for (key, value) in previous.extra {
                    document.extra.entry(key).or_insert(value);
                }
                document.created_at = previous.created_at.or(Some(now));
                ChangeRecord::Modified(document.clone())
            }
            None => {
                document.created_at = Some(now);
                ChangeRecord::Added(document.clone())
            }
        };

        documents.insert(document.id.clone(), document);
        state.write_count += 1;
        record
    }
}

impl RemoteCollection for MemoryCollection {
    async fn set_merge(&self, owner_id: &str, reminder: &Reminder) -> Result<()> {
        let mut state = self.lock();
        state.check_write(&reminder.id)?;
        let record = Self::write(&mut state, owner_id, reminder);
        state.publish(owner_id, record);
        Ok(())
    }

    async fn update(&self, owner_id: &str, reminder: &Reminder) -> Result<()> {
        let mut state = self.lock();
        state.check_write(&reminder.id)?;
        let exists = state
            .documents
            .get(owner_id)
            .is_some_and(|docs| docs.contains_key(&reminder.id));
        if !exists {
            return Err(Error::RemoteWrite(format!(
                "no document to update: {}",
                reminder.id
            )));
        }
        let record = Self::write(&mut state, owner_id, reminder);
        state.publish(owner_id, record);
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &ReminderId) -> Result<()> {
        let mut state = self.lock();
        state.check_write(id)?;
        let removed = state
            .documents
            .get_mut(owner_id)
            .and_then(|docs| docs.remove(id));
        state.write_count += 1;
        if removed.is_some() {
            state.publish(owner_id, ChangeRecord::removed(id.clone()));
        }
        Ok(())
    }

    fn subscribe(&self, owner_id: &str) -> Result<Subscription> {
        let mut state = self.lock();
        if state.fail_subscribe {
            return Err(Error::Listener("injected subscribe failure".to_string()));
        }

        let (sender, subscription) = sync::channel();
        let mut snapshot: Vec<Reminder> = state
            .documents
            .get(owner_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        snapshot.sort_by(|a, b| a.due_at.cmp(&b.due_at));
        sender.send_batch(snapshot.into_iter().map(ChangeRecord::Added).collect());

        state.subscribers.push((owner_id.to_string(), sender));
        Ok(subscription)
    }
}

#[derive(Default)]
struct BlobState {
    objects: BTreeMap<String, (Vec<u8>, String)>,
    fail_uploads: bool,
    fail_deletes: bool,
}

/// In-memory attachment storage shared by clones.
#[derive(Clone, Default)]
pub struct MemoryBlobStorage {
    state: Arc<Mutex<BlobState>>,
}

impl MemoryBlobStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BlobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.lock().fail_uploads = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// Stored bytes and content type for a key.
    pub fn object(&self, object_key: &str) -> Option<(Vec<u8>, String)> {
        self.lock().objects.get(object_key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().objects.keys().cloned().collect()
    }

    /// Retrieval URL handed out for a key.
    #[must_use]
    pub fn url_for(object_key: &str) -> String {
        format!("memory://{object_key}")
    }
}

impl BlobStorage for MemoryBlobStorage {
    async fn upload(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let mut state = self.lock();
        if state.fail_uploads {
            return Err(Error::Storage(format!("injected upload failure: {object_key}")));
        }
        state
            .objects
            .insert(object_key.to_string(), (bytes, content_type.to_string()));
        Ok(Self::url_for(object_key))
    }

    async fn delete(&self, object_key: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_deletes {
            return Err(Error::Storage(format!("injected delete failure: {object_key}")));
        }
        state
            .objects
            .remove(object_key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(object_key.to_string()))
    }
}
