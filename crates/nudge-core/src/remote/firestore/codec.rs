//! Conversion between reminders and Firestore REST documents.
//!
//! Firestore wraps every value in a typed object (`{"stringValue": ".."}`,
//! `{"integerValue": "12"}`, ...). Reminders are first serialized with serde
//! and the resulting JSON tree is wrapped or unwrapped field by field.

use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::models::{Reminder, ReminderId};
use crate::{Error, Result};

/// Fields written as `timestampValue` rather than strings.
const TIMESTAMP_FIELDS: [&str; 3] = ["datetime", "createdAt", "updatedAt"];

/// A document as returned by `runQuery` and `get`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirestoreDocument {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub update_time: Option<String>,
}

impl FirestoreDocument {
    /// Last path segment of the document name.
    #[must_use]
    pub fn document_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

/// Encode a reminder's fields, leaving out `skip` keys.
pub fn encode_fields(reminder: &Reminder, skip: &[&str]) -> Result<Map<String, Value>> {
    let Value::Object(plain) = serde_json::to_value(reminder)? else {
        return Err(Error::InvalidInput(
            "reminder did not serialize to an object".to_string(),
        ));
    };

    Ok(plain
        .into_iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .map(|(key, value)| {
            let encoded = if TIMESTAMP_FIELDS.contains(&key.as_str()) {
                encode_timestamp(value)
            } else {
                encode_value(value)
            };
            (key, encoded)
        })
        .collect())
}

/// Decode a document into a reminder, keyed by its document id.
pub fn decode_document(document: &FirestoreDocument) -> Result<Reminder> {
    let mut plain = Map::with_capacity(document.fields.len() + 1);
    for (key, value) in &document.fields {
        plain.insert(key.clone(), decode_value(value)?);
    }

    let id: ReminderId = document.document_id().parse()?;
    plain.insert("id".to_string(), Value::String(id.to_string()));
    Ok(serde_json::from_value(Value::Object(plain))?)
}

/// Wrap plain JSON in Firestore's typed value representation.
#[must_use]
pub fn encode_value(value: Value) -> Value {
    match value {
        Value::Null => serde_json::json!({ "nullValue": null }),
        Value::Bool(flag) => serde_json::json!({ "booleanValue": flag }),
        Value::Number(number) => encode_number(&number),
        Value::String(text) => serde_json::json!({ "stringValue": text }),
        Value::Array(items) => serde_json::json!({
            "arrayValue": { "values": items.into_iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => serde_json::json!({
            "mapValue": {
                "fields": map
                    .into_iter()
                    .map(|(key, value)| (key, encode_value(value)))
                    .collect::<Map<_, _>>()
            }
        }),
    }
}

fn encode_timestamp(value: Value) -> Value {
    match value {
        Value::String(text) => serde_json::json!({ "timestampValue": text }),
        other => encode_value(other),
    }
}

fn encode_number(number: &Number) -> Value {
    if let Some(integer) = number.as_i64() {
        serde_json::json!({ "integerValue": integer.to_string() })
    } else if let Some(integer) = number.as_u64() {
        serde_json::json!({ "integerValue": integer.to_string() })
    } else {
        serde_json::json!({ "doubleValue": number.as_f64().unwrap_or_default() })
    }
}

/// Unwrap a Firestore typed value into plain JSON.
pub fn decode_value(value: &Value) -> Result<Value> {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Err(invalid_value(value));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" => Ok(inner.clone()),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => Ok(inner.clone()),
        "integerValue" => {
            let integer = match inner {
                Value::String(text) => text.parse::<i64>().map_err(|_| invalid_value(value))?,
                Value::Number(number) => number.as_i64().ok_or_else(|| invalid_value(value))?,
                _ => return Err(invalid_value(value)),
            };
            Ok(Value::from(integer))
        }
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let mut plain = Map::new();
            if let Some(fields) = inner.get("fields").and_then(Value::as_object) {
                for (key, value) in fields {
                    plain.insert(key.clone(), decode_value(value)?);
                }
            }
            Ok(Value::Object(plain))
        }
        "geoPointValue" => Ok(inner.clone()),
        _ => Err(invalid_value(value)),
    }
}

/// Quote a field path segment for update masks and transforms.
///
/// Simple identifiers are used as-is; anything else is backtick-quoted.
#[must_use]
pub fn quote_field_path(field: &str) -> String {
    let mut chars = field.chars();
    let simple = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if simple {
        return field.to_string();
    }

    let escaped = field.replace('\\', "\\\\").replace('`', "\\`");
    format!("`{escaped}`")
}

fn invalid_value(value: &Value) -> Error {
    Error::Serialization(serde::de::Error::custom(format!(
        "unsupported Firestore value: {}",
        crate::util::compact_text(&value.to_string())
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn sample() -> Reminder {
        let mut reminder = Reminder::new("Pay bill", Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
        reminder.id = "r1".parse().unwrap();
        reminder.repeat_minutes = Some(30);
        reminder.created_at = None;
        reminder.updated_at = None;
        reminder
            .extra
            .insert("tags".to_string(), serde_json::json!(["home", {"weight": 1.5}]));
        reminder
    }

    #[test]
    fn encodes_typed_values() {
        let fields = encode_fields(&sample(), &[]).unwrap();
        assert_eq!(fields["title"], serde_json::json!({"stringValue": "Pay bill"}));
        assert_eq!(
            fields["datetime"],
            serde_json::json!({"timestampValue": "2024-01-01T10:00:00Z"})
        );
        assert_eq!(fields["repeatMinutes"], serde_json::json!({"integerValue": "30"}));
        assert_eq!(fields["completed"], serde_json::json!({"booleanValue": false}));
        assert_eq!(
            fields["tags"]["arrayValue"]["values"][1]["mapValue"]["fields"]["weight"],
            serde_json::json!({"doubleValue": 1.5})
        );
    }

    #[test]
    fn skip_list_omits_fields() {
        let fields = encode_fields(&sample(), &["id", "title"]).unwrap();
        assert!(!fields.contains_key("id"));
        assert!(!fields.contains_key("title"));
        assert!(fields.contains_key("datetime"));
    }

    #[test]
    fn decodes_document_using_name_as_id() {
        let original = sample();
        let document = FirestoreDocument {
            name: "projects/p/databases/(default)/documents/users/u1/reminders/r1".to_string(),
            fields: encode_fields(&original, &["id"]).unwrap(),
            update_time: Some("2024-01-01T10:00:01.123456Z".to_string()),
        };

        assert_eq!(document.document_id(), "r1");
        assert_eq!(decode_document(&document).unwrap(), original);
    }

    #[test]
    fn decodes_server_timestamps_with_fractional_seconds() {
        let raw = serde_json::json!({
            "name": "projects/p/databases/(default)/documents/users/u1/reminders/42",
            "fields": {
                "title": {"stringValue": "Water plants"},
                "datetime": {"timestampValue": "2024-01-01T10:00:00Z"},
                "updatedAt": {"timestampValue": "2024-01-02T08:30:00.250Z"},
                "streak": {"integerValue": "3"},
                "note": {"nullValue": null}
            },
            "updateTime": "2024-01-02T08:30:00.250Z"
        });

        let document: FirestoreDocument = serde_json::from_value(raw).unwrap();
        let reminder = decode_document(&document).unwrap();
        assert_eq!(reminder.id.as_str(), "42");
        assert!(reminder.updated_at.is_some());
        assert_eq!(reminder.extra["streak"], 3);
        assert_eq!(reminder.extra["note"], Value::Null);
    }

    #[test]
    fn rejects_unknown_value_kinds() {
        assert!(decode_value(&serde_json::json!({"mysteryValue": 1})).is_err());
        assert!(decode_value(&serde_json::json!("bare")).is_err());
    }

    #[test]
    fn quotes_non_identifier_field_paths() {
        assert_eq!(quote_field_path("repeatMinutes"), "repeatMinutes");
        assert_eq!(quote_field_path("_private"), "_private");
        assert_eq!(quote_field_path("caregiver-note"), "`caregiver-note`");
        assert_eq!(quote_field_path("1st"), "`1st`");
        assert_eq!(quote_field_path("a`b"), "`a\\`b`");
    }
}
