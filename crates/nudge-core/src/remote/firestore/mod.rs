//! Firestore REST backend for the reminder collection.
//!
//! Writes go through `documents:commit` so merge masks, preconditions and
//! server timestamps are applied atomically. The change listener polls a
//! `runQuery` over the owner's collection and diffs consecutive snapshots by
//! document `updateTime`.

pub mod codec;

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::config::FirebaseConfig;
use crate::models::{ChangeRecord, Reminder, ReminderId};
use crate::sync::{self, BatchSender, Subscription};
use crate::{Error, Result};

use self::codec::{decode_document, encode_fields, quote_field_path, FirestoreDocument};
use super::{collection_path, document_path, RemoteCollection};

/// Fields set from the server clock instead of the client's.
const UPDATED_AT_FIELD: &str = "updatedAt";
const CREATED_AT_FIELD: &str = "createdAt";
/// Optional fields omitted from the payload when unset. They stay in the
/// mask so an update deletes the remote value.
const CLEARABLE_FIELDS: [&str; 5] = ["repeatMinutes", "category", "photo", "voice", "userId"];

/// Reminder collection stored in Cloud Firestore.
#[derive(Clone)]
pub struct FirestoreCollection {
    config: FirebaseConfig,
    client: Client,
    id_token: Arc<RwLock<String>>,
}

impl FirestoreCollection {
    /// Create a collection client authenticated with a Firebase ID token.
    pub fn new(config: FirebaseConfig, id_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))?;
        Ok(Self {
            config,
            client,
            id_token: Arc::new(RwLock::new(id_token.into())),
        })
    }

    /// Swap in a refreshed ID token; running listeners pick it up on their
    /// next poll.
    pub fn set_id_token(&self, id_token: impl Into<String>) {
        *self.id_token.write().unwrap_or_else(PoisonError::into_inner) = id_token.into();
    }

    fn id_token(&self) -> String {
        self.id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn document_name(&self, owner_id: &str, id: &ReminderId) -> String {
        format!("{}/{}", self.config.documents_root(), document_path(owner_id, id))
    }

    /// Build the update write shared by merge-set and update.
    fn update_write(&self, owner_id: &str, reminder: &Reminder, must_exist: bool) -> Result<Value> {
        let mut skip = vec!["id", UPDATED_AT_FIELD];
        let stamp_created = reminder.created_at.is_none();
        if stamp_created {
            skip.push(CREATED_AT_FIELD);
        }

        let fields = encode_fields(reminder, &skip)?;
        let mut field_paths: Vec<String> = fields.keys().map(|key| quote_field_path(key)).collect();
        for field in CLEARABLE_FIELDS {
            if !fields.contains_key(field) {
                field_paths.push(field.to_string());
            }
        }

        let mut transforms = vec![serde_json::json!({
            "fieldPath": UPDATED_AT_FIELD,
            "setToServerValue": "REQUEST_TIME",
        })];
        if stamp_created {
            transforms.push(serde_json::json!({
                "fieldPath": CREATED_AT_FIELD,
                "setToServerValue": "REQUEST_TIME",
            }));
        }

        let mut write = serde_json::json!({
            "update": {
                "name": self.document_name(owner_id, &reminder.id),
                "fields": fields,
            },
            "updateMask": { "fieldPaths": field_paths },
            "updateTransforms": transforms,
        });
        if must_exist {
            write["currentDocument"] = serde_json::json!({ "exists": true });
        }
        Ok(write)
    }

    async fn commit(&self, write: Value) -> Result<()> {
        let response = self
            .client
            .post(format!("{}:commit", self.config.documents_url()))
            .bearer_auth(self.id_token())
            .json(&serde_json::json!({ "writes": [write] }))
            .send()
            .await
            .map_err(|error| Error::RemoteWrite(error.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => Error::NotAuthenticated,
            _ => Error::RemoteWrite(crate::auth::parse_api_error(status, &body)),
        })
    }

    /// Fetch the owner's documents ordered by due time.
    async fn query(&self, owner_id: &str) -> Result<Vec<FirestoreDocument>> {
        let parent = format!(
            "{}/users/{}",
            self.config.documents_url(),
            urlencoding::encode(owner_id)
        );
        let query = serde_json::json!({
            "structuredQuery": {
                "from": [{ "collectionId": "reminders" }],
                "orderBy": [{
                    "field": { "fieldPath": "datetime" },
                    "direction": "ASCENDING",
                }],
            }
        });

        let response = self
            .client
            .post(format!("{parent}:runQuery"))
            .bearer_auth(self.id_token())
            .json(&query)
            .send()
            .await
            .map_err(|error| Error::Listener(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| Error::Listener(error.to_string()))?;
        if !status.is_success() {
            return Err(Error::Listener(crate::auth::parse_api_error(status, &body)));
        }

        let rows: Vec<QueryRow> = serde_json::from_str(&body)?;
        Ok(rows.into_iter().filter_map(|row| row.document).collect())
    }

    async fn poll(self, owner_id: String, sender: BatchSender) {
        let mut known = BTreeMap::new();
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = sender.closed() => break,
                _ = interval.tick() => {}
            }

            let batch = match self.query(&owner_id).await {
                Ok(documents) => diff_snapshot(&mut known, &documents),
                Err(error) => {
                    tracing::warn!("Reminder listener poll failed for {}: {error}", collection_path(&owner_id));
                    sender.send_failure(error.to_string());
                    break;
                }
            };

            if !sender.send_batch(batch) {
                break;
            }
        }
        tracing::debug!("Reminder listener for {} stopped", collection_path(&owner_id));
    }
}

impl RemoteCollection for FirestoreCollection {
    async fn set_merge(&self, owner_id: &str, reminder: &Reminder) -> Result<()> {
        let write = self.update_write(owner_id, reminder, false)?;
        self.commit(write).await
    }

    async fn update(&self, owner_id: &str, reminder: &Reminder) -> Result<()> {
        let write = self.update_write(owner_id, reminder, true)?;
        self.commit(write).await
    }

    async fn delete(&self, owner_id: &str, id: &ReminderId) -> Result<()> {
        let write = serde_json::json!({ "delete": self.document_name(owner_id, id) });
        self.commit(write).await
    }

    fn subscribe(&self, owner_id: &str) -> Result<Subscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| Error::Listener(format!("no async runtime for listener: {error}")))?;

        let (sender, subscription) = sync::channel();
        runtime.spawn(self.clone().poll(owner_id.to_string(), sender));
        Ok(subscription)
    }
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    document: Option<FirestoreDocument>,
}

/// Turn the next snapshot into change records.
///
/// `known` maps document ids to the `updateTime` last seen and is updated in
/// place. Removals come first, then additions and modifications in snapshot
/// order. Documents that fail to decode are logged and skipped.
pub fn diff_snapshot(
    known: &mut BTreeMap<ReminderId, Option<String>>,
    documents: &[FirestoreDocument],
) -> Vec<ChangeRecord> {
    let mut current = BTreeMap::new();
    let mut upserts = Vec::new();

    for document in documents {
        let reminder = match decode_document(document) {
            Ok(reminder) => reminder,
            Err(error) => {
                tracing::warn!("Skipping undecodable document {}: {error}", document.name);
                continue;
            }
        };

        match known.get(&reminder.id) {
            None => upserts.push(ChangeRecord::Added(reminder.clone())),
            Some(seen) if *seen != document.update_time => {
                upserts.push(ChangeRecord::Modified(reminder.clone()));
            }
            Some(_) => {}
        }
        current.insert(reminder.id, document.update_time.clone());
    }

    let mut batch: Vec<ChangeRecord> = known
        .keys()
        .filter(|id| !current.contains_key(*id))
        .cloned()
        .map(ChangeRecord::removed)
        .collect();
    batch.extend(upserts);

    *known = current;
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChangeKind;
    use pretty_assertions::assert_eq;

    fn document(id: &str, title: &str, hour: u32, update_time: &str) -> FirestoreDocument {
        serde_json::from_value(serde_json::json!({
            "name": format!("projects/p/databases/(default)/documents/users/u1/reminders/{id}"),
            "fields": {
                "title": {"stringValue": title},
                "datetime": {"timestampValue": format!("2024-01-01T{hour:02}:00:00Z")},
            },
            "updateTime": update_time,
        }))
        .unwrap()
    }

    fn kinds(batch: &[ChangeRecord]) -> Vec<(ChangeKind, String)> {
        batch
            .iter()
            .map(|record| (record.kind(), record.id().to_string()))
            .collect()
    }

    #[test]
    fn first_snapshot_is_all_added() {
        let mut known = BTreeMap::new();
        let batch = diff_snapshot(
            &mut known,
            &[document("a", "A", 7, "t1"), document("b", "B", 9, "t1")],
        );
        assert_eq!(
            kinds(&batch),
            vec![
                (ChangeKind::Added, "a".to_string()),
                (ChangeKind::Added, "b".to_string())
            ]
        );
    }

    #[test]
    fn later_snapshots_report_only_differences() {
        let mut known = BTreeMap::new();
        diff_snapshot(
            &mut known,
            &[document("a", "A", 7, "t1"), document("b", "B", 9, "t1")],
        );

        let batch = diff_snapshot(
            &mut known,
            &[document("b", "B2", 9, "t2"), document("c", "C", 10, "t2")],
        );
        assert_eq!(
            kinds(&batch),
            vec![
                (ChangeKind::Removed, "a".to_string()),
                (ChangeKind::Modified, "b".to_string()),
                (ChangeKind::Added, "c".to_string())
            ]
        );

        let unchanged = diff_snapshot(
            &mut known,
            &[document("b", "B2", 9, "t2"), document("c", "C", 10, "t2")],
        );
        assert!(unchanged.is_empty());
    }

    #[test]
    fn undecodable_documents_are_skipped() {
        let mut known = BTreeMap::new();
        let broken: FirestoreDocument = serde_json::from_value(serde_json::json!({
            "name": "projects/p/databases/(default)/documents/users/u1/reminders/x",
            "fields": {"title": {"stringValue": "no due date"}},
        }))
        .unwrap();

        let batch = diff_snapshot(&mut known, &[broken, document("a", "A", 7, "t1")]);
        assert_eq!(kinds(&batch), vec![(ChangeKind::Added, "a".to_string())]);
    }

    #[test]
    fn update_write_masks_fields_and_stamps_server_time() {
        let collection =
            FirestoreCollection::new(FirebaseConfig::new("nudge-app", "key"), "token").unwrap();
        let mut reminder = Reminder::new("Pay bill", chrono::Utc::now());
        reminder.id = "r1".parse().unwrap();
        reminder.created_at = None;
        reminder
            .extra
            .insert("caregiver-note".to_string(), serde_json::json!("hi"));

        let write = collection.update_write("u1", &reminder, true).unwrap();
        assert_eq!(
            write["update"]["name"],
            "projects/nudge-app/databases/(default)/documents/users/u1/reminders/r1"
        );
        assert_eq!(write["currentDocument"]["exists"], true);

        let mask: Vec<&str> = write["updateMask"]["fieldPaths"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(mask.contains(&"title"));
        assert!(mask.contains(&"`caregiver-note`"));
        assert!(!mask.contains(&"updatedAt"));
        assert!(!mask.contains(&"id"));

        let transformed: Vec<&str> = write["updateTransforms"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|transform| transform["fieldPath"].as_str())
            .collect();
        assert_eq!(transformed, vec!["updatedAt", "createdAt"]);
    }

    #[test]
    fn cleared_optional_fields_stay_in_the_mask() {
        let collection =
            FirestoreCollection::new(FirebaseConfig::new("nudge-app", "key"), "token").unwrap();
        let mut reminder = Reminder::new("Stretch", chrono::Utc::now());
        reminder.category = Some("health".to_string());
        reminder.repeat_minutes = None;

        for must_exist in [true, false] {
            let write = collection.update_write("u1", &reminder, must_exist).unwrap();
            let mask: Vec<&str> = write["updateMask"]["fieldPaths"]
                .as_array()
                .unwrap()
                .iter()
                .filter_map(Value::as_str)
                .collect();
            let fields = write["update"]["fields"].as_object().unwrap();

            assert!(mask.contains(&"repeatMinutes"));
            assert!(!fields.contains_key("repeatMinutes"));
            assert!(mask.contains(&"photo"));
            assert!(!fields.contains_key("photo"));
            assert_eq!(mask.iter().filter(|path| **path == "category").count(), 1);
            assert!(fields.contains_key("category"));
        }
    }

    #[test]
    fn merge_write_has_no_precondition() {
        let collection =
            FirestoreCollection::new(FirebaseConfig::new("nudge-app", "key"), "token").unwrap();
        let reminder = Reminder::new("Pay bill", chrono::Utc::now());

        let write = collection.update_write("u1", &reminder, false).unwrap();
        assert!(write.get("currentDocument").is_none());
        assert_eq!(write["updateTransforms"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "Requires NUDGE_FIREBASE_* env vars, NUDGE_TEST_ID_TOKEN, and network access"]
    async fn live_write_and_listen() {
        let _ = dotenvy::dotenv();
        let config = FirebaseConfig::from_env()
            .expect("Firebase env parsing should not error")
            .expect("Firebase config should be present");
        let token = std::env::var("NUDGE_TEST_ID_TOKEN").expect("NUDGE_TEST_ID_TOKEN");
        let owner = std::env::var("NUDGE_TEST_USER_ID").expect("NUDGE_TEST_USER_ID");
        let collection = FirestoreCollection::new(config, token).unwrap();

        let reminder = Reminder::new("Integration", chrono::Utc::now());
        collection.set_merge(&owner, &reminder).await.unwrap();

        let mut subscription = collection.subscribe(&owner).unwrap();
        let Some(sync::ListenerEvent::Batch(batch)) = subscription.next_event().await else {
            panic!("expected initial snapshot");
        };
        assert!(batch.iter().any(|record| record.id() == &reminder.id));

        collection.delete(&owner, &reminder.id).await.unwrap();
    }
}
