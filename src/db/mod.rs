//! Entity store adapter.
//!
//! Every resource is persisted as a schemaless [`Document`] keyed by
//! `(kind, id)`. Backends implement [`EntityStore`]; the services never
//! see which one is in use.

use std::fmt;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod datastore;
pub mod memory;
pub mod sqlite;

pub use datastore::DatastoreStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Generic document representation spoken by every backend.
pub type Document = Map<String, Value>;

/// Identifier of one entity within a kind.
///
/// Store-generated keys are numeric; application-chosen keys (a team
/// name for standings) are names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Numeric(i64),
    Name(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Numeric(id) => write!(f, "{id}"),
            EntityId::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Query over one kind: at most one equality filter and one sort key.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: String,
    pub filter: Option<Filter>,
    pub order: Option<(String, Direction)>,
}

impl Query {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filter: None,
            order: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((field.into(), direction));
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned {code}: {message}")]
    Status { code: u16, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not decode stored document: {0}")]
    Decode(String),

    #[error("could not encode document: {0}")]
    Encode(String),

    #[error("store authentication failed: {0}")]
    Auth(String),
}

/// Key/value document database.
///
/// `put` without an id allocates one; `put` with an id overwrites the
/// whole document. There is no partial-field merge, callers read, merge
/// and write back.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn put(
        &self,
        kind: &str,
        id: Option<&EntityId>,
        document: Document,
    ) -> Result<EntityId, StoreError>;

    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, kind: &str, id: &EntityId) -> Result<(), StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<(EntityId, Document)>, StoreError>;
}

/// Map a typed record onto its document representation.
pub fn encode<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encode(format!(
            "expected an object, got {}",
            value_type(&other)
        ))),
    }
}

/// Map a stored document back onto a typed record.
pub fn decode<T: DeserializeOwned>(document: Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(document)).map_err(|e| StoreError::Decode(e.to_string()))
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        #[serde(rename = "Name")]
        name: String,
        #[serde(default)]
        age: i64,
    }

    #[test]
    fn entity_id_serializes_untagged() {
        assert_eq!(serde_json::to_value(EntityId::Numeric(7)).unwrap(), json!(7));
        assert_eq!(
            serde_json::to_value(EntityId::Name("Jogoo Club".into())).unwrap(),
            json!("Jogoo Club")
        );
    }

    #[test]
    fn decode_fills_missing_defaults() {
        let mut doc = Document::new();
        doc.insert("Name".into(), json!("J. Doe"));
        let row: Row = decode(doc).unwrap();
        assert_eq!(row, Row { name: "J. Doe".into(), age: 0 });
    }

    #[test]
    fn encode_rejects_non_objects() {
        let err = encode(&vec![1, 2]).unwrap_err();
        assert!(matches!(err, StoreError::Encode(_)));
    }
}
