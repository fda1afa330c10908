// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! Values map onto JSON the obvious way. Byte strings have no JSON counterpart and are encoded as
//! standard base64 strings; timestamps are RFC 3339 strings. Both are therefore read back as
//! plain strings.
//!
//! Reports render as nested objects, for example for a collection with one modified item:
//!
//! ```json
//! {
//!   "added": [],
//!   "modified": [
//!     {
//!       "item": { "name": "Alice", "age": 9 },
//!       "changes": { "age": { "old_value": 8, "new_value": 9 } }
//!     }
//!   ],
//!   "deleted": [],
//!   "original": []
//! }
//! ```
//!
//! Absent values (`None`) are left out of a property change.
use crate::{
    Value,
    metadata::{Changes, ItemReport, Metadata, PropertyChange},
};
use serde_json::{Map, Value as Json};

/// Converts a [`Value`] to a [`serde_json::Value`].
impl From<Value> for Json {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Bool(v) => v.into(),
            Value::U64(v) => v.into(),
            Value::I64(v) => v.into(),
            Value::Double(v) => v.into(),
            Value::String(v) => v.into(),
            Value::Bytes(v) => {
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, v).into()
            }
            #[cfg(feature = "chrono")]
            Value::Timestamp(v) => v.to_rfc3339().into(),
            Value::Record(record) => Json::Object(
                record
                    .into_iter()
                    .map(|(property, value)| (property, value.into()))
                    .collect(),
            ),
            Value::Array(items) => Json::Array(items.into_iter().map(Into::into).collect()),
        }
    }
}

/// Converts a [`serde_json::Value`] to a [`Value`].
///
/// Numbers become [`Value::U64`] if they are non-negative integers, [`Value::I64`] if they are
/// negative integers and [`Value::Double`] otherwise.
impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(v) => Value::Bool(v),
            Json::Number(n) => {
                if let Some(v) = n.as_u64() {
                    Value::U64(v)
                } else if let Some(v) = n.as_i64() {
                    Value::I64(v)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(v) => Value::String(v),
            Json::Array(items) => Value::Array(items.into_iter().map(Into::into).collect()),
            Json::Object(object) => Value::Record(
                object
                    .into_iter()
                    .map(|(property, value)| (property, value.into()))
                    .collect(),
            ),
        }
    }
}

impl From<PropertyChange> for Json {
    fn from(change: PropertyChange) -> Self {
        match change {
            PropertyChange::Value {
                old_value,
                new_value,
            } => {
                let mut object = Map::new();
                if let Some(old_value) = old_value {
                    object.insert("old_value".into(), old_value.into());
                }
                if let Some(new_value) = new_value {
                    object.insert("new_value".into(), new_value.into());
                }
                Json::Object(object)
            }
            PropertyChange::Detail(metadata) => metadata.into(),
        }
    }
}

impl From<Changes> for Json {
    fn from(changes: Changes) -> Self {
        Json::Object(
            changes
                .into_iter()
                .map(|(property, change)| (property, change.into()))
                .collect(),
        )
    }
}

impl From<ItemReport> for Json {
    fn from(report: ItemReport) -> Self {
        let mut object = Map::new();
        object.insert("item".into(), Value::Record(report.item).into());
        object.insert("changes".into(), report.changes.into());
        Json::Object(object)
    }
}

impl From<Metadata> for Json {
    fn from(metadata: Metadata) -> Self {
        let bucket =
            |reports: Vec<ItemReport>| Json::Array(reports.into_iter().map(Into::into).collect());
        let mut object = Map::new();
        object.insert("added".into(), bucket(metadata.added));
        object.insert("modified".into(), bucket(metadata.modified));
        object.insert("deleted".into(), bucket(metadata.deleted));
        object.insert("original".into(), bucket(metadata.original));
        Json::Object(object)
    }
}
