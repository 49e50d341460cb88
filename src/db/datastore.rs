//! Google Cloud Datastore over its REST API (v1).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{Direction, Document, EntityId, EntityStore, Query, StoreError};
use crate::gcp::TokenSource;

const DEFAULT_BASE_URL: &str = "https://datastore.googleapis.com/v1";

/// Indexed string properties are capped at 1500 bytes.
const MAX_INDEXED_STRING: usize = 1500;

pub struct DatastoreStore {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    tokens: Option<Arc<TokenSource>>,
}

impl DatastoreStore {
    pub fn new(http: reqwest::Client, project_id: impl Into<String>, tokens: Arc<TokenSource>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: project_id.into(),
            tokens: Some(tokens),
        }
    }

    /// Talk to a local Datastore emulator, which needs no credentials.
    pub fn emulator(http: reqwest::Client, host: &str, project_id: impl Into<String>) -> Self {
        Self {
            http,
            base_url: format!("http://{}/v1", host.trim_end_matches('/')),
            project_id: project_id.into(),
            tokens: None,
        }
    }

    async fn call(&self, method: &str, body: Value) -> Result<Value, StoreError> {
        let url = format!("{}/projects/{}:{}", self.base_url, self.project_id, method);
        let mut request = self.http.post(url).json(&body);
        if let Some(tokens) = &self.tokens {
            let token = tokens
                .token()
                .await
                .map_err(|e| StoreError::Auth(e.to_string()))?;
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!("datastore {} failed with {}: {}", method, status, message);
            return Err(StoreError::Status {
                code: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }

    fn key(&self, kind: &str, id: Option<&EntityId>) -> Value {
        let mut element = Map::new();
        element.insert("kind".into(), Value::from(kind));
        match id {
            Some(EntityId::Numeric(id)) => {
                element.insert("id".into(), Value::from(id.to_string()));
            }
            Some(EntityId::Name(name)) => {
                element.insert("name".into(), Value::from(name.as_str()));
            }
            None => {}
        }
        json!({
            "partitionId": { "projectId": self.project_id },
            "path": [Value::Object(element)],
        })
    }

    async fn commit(&self, mutation: Value) -> Result<Value, StoreError> {
        self.call(
            "commit",
            json!({ "mode": "NON_TRANSACTIONAL", "mutations": [mutation] }),
        )
        .await
    }
}

#[async_trait]
impl EntityStore for DatastoreStore {
    async fn put(
        &self,
        kind: &str,
        id: Option<&EntityId>,
        document: Document,
    ) -> Result<EntityId, StoreError> {
        let entity = json!({
            "key": self.key(kind, id),
            "properties": encode_properties(&document),
        });
        let mutation = match id {
            Some(_) => json!({ "upsert": entity }),
            None => json!({ "insert": entity }),
        };
        let response = self.commit(mutation).await?;

        match id {
            Some(id) => Ok(id.clone()),
            None => {
                let key = response
                    .pointer("/mutationResults/0/key")
                    .ok_or_else(|| StoreError::Decode("commit returned no allocated key".into()))?;
                id_from_key(key)
            }
        }
    }

    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<Document>, StoreError> {
        let response = self
            .call("lookup", json!({ "keys": [self.key(kind, Some(id))] }))
            .await?;

        match response.pointer("/found/0/entity") {
            Some(entity) => decode_entity(entity).map(|(_, doc)| Some(doc)),
            None => Ok(None),
        }
    }

    async fn delete(&self, kind: &str, id: &EntityId) -> Result<(), StoreError> {
        self.commit(json!({ "delete": self.key(kind, Some(id)) }))
            .await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<(EntityId, Document)>, StoreError> {
        let mut body = json!({ "kind": [{ "name": query.kind }] });
        if let Some(filter) = &query.filter {
            body["filter"] = json!({
                "propertyFilter": {
                    "property": { "name": filter.field },
                    "op": "EQUAL",
                    "value": encode_value(&filter.value),
                }
            });
        }
        if let Some((field, direction)) = &query.order {
            let direction = match direction {
                Direction::Ascending => "ASCENDING",
                Direction::Descending => "DESCENDING",
            };
            body["order"] = json!([{ "property": { "name": field }, "direction": direction }]);
        }

        let mut results = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut page_query = body.clone();
            if let Some(cursor) = &cursor {
                page_query["startCursor"] = Value::from(cursor.as_str());
            }
            let response = self
                .call(
                    "runQuery",
                    json!({
                        "partitionId": { "projectId": self.project_id },
                        "query": page_query,
                    }),
                )
                .await?;

            let batch = response
                .get("batch")
                .ok_or_else(|| StoreError::Decode("runQuery returned no batch".into()))?;
            let page = batch
                .get("entityResults")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for result in page {
                let entity = result
                    .get("entity")
                    .ok_or_else(|| StoreError::Decode("entity result without entity".into()))?;
                results.push(decode_entity(entity)?);
            }

            let next = batch.get("endCursor").and_then(Value::as_str).map(str::to_string);
            let unfinished = batch.get("moreResults").and_then(Value::as_str) == Some("NOT_FINISHED");
            if !unfinished || page.is_empty() || next.is_none() || next == cursor {
                break;
            }
            cursor = next;
        }

        Ok(results)
    }
}

fn id_from_key(key: &Value) -> Result<EntityId, StoreError> {
    let element = key
        .get("path")
        .and_then(Value::as_array)
        .and_then(|path| path.last())
        .ok_or_else(|| StoreError::Decode("key without path".into()))?;

    if let Some(id) = element.get("id") {
        let id = match id {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
        return id
            .map(EntityId::Numeric)
            .ok_or_else(|| StoreError::Decode("malformed numeric key".into()));
    }
    element
        .get("name")
        .and_then(Value::as_str)
        .map(|name| EntityId::Name(name.to_string()))
        .ok_or_else(|| StoreError::Decode("incomplete key".into()))
}

fn decode_entity(entity: &Value) -> Result<(EntityId, Document), StoreError> {
    let key = entity
        .get("key")
        .ok_or_else(|| StoreError::Decode("entity without key".into()))?;
    let id = id_from_key(key)?;
    let properties = match entity.get("properties") {
        Some(Value::Object(properties)) => decode_properties(properties)?,
        _ => Document::new(),
    };
    Ok((id, properties))
}

pub(crate) fn encode_properties(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(name, value)| (name.clone(), encode_value(value)))
            .collect(),
    )
}

pub(crate) fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) if s.len() > MAX_INDEXED_STRING => {
            json!({ "stringValue": s, "excludeFromIndexes": true })
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "entityValue": { "properties": encode_properties(map) } }),
    }
}

pub(crate) fn decode_properties(properties: &Map<String, Value>) -> Result<Document, StoreError> {
    properties
        .iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(value)?)))
        .collect()
}

pub(crate) fn decode_value(value: &Value) -> Result<Value, StoreError> {
    let Some(object) = value.as_object() else {
        return Err(StoreError::Decode(format!("malformed property value {value}")));
    };

    if let Some(s) = object.get("stringValue").or_else(|| object.get("timestampValue")) {
        return Ok(s.clone());
    }
    if let Some(i) = object.get("integerValue") {
        return match i {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| StoreError::Decode(format!("malformed integer {s}"))),
            other => Ok(other.clone()),
        };
    }
    if let Some(v) = object.get("doubleValue").or_else(|| object.get("booleanValue")) {
        return Ok(v.clone());
    }
    if object.contains_key("nullValue") {
        return Ok(Value::Null);
    }
    if let Some(array) = object.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        return values
            .iter()
            .map(decode_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array);
    }
    if let Some(entity) = object.get("entityValue") {
        return match entity.get("properties") {
            Some(Value::Object(properties)) => decode_properties(properties).map(Value::Object),
            _ => Ok(Value::Object(Map::new())),
        };
    }

    // Keys, geo points and blobs are kept in their wire form.
    Ok(value.clone())
}
