//! Process-local store used for development and tests.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::{Direction, Document, EntityId, EntityStore, Query, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    kinds: RwLock<BTreeMap<String, BTreeMap<EntityId, Document>>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, kind: &str) -> usize {
        self.kinds.read().get(kind).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn put(
        &self,
        kind: &str,
        id: Option<&EntityId>,
        document: Document,
    ) -> Result<EntityId, StoreError> {
        let id = match id {
            Some(id) => id.clone(),
            None => EntityId::Numeric(self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1),
        };
        self.kinds
            .write()
            .entry(kind.to_string())
            .or_default()
            .insert(id.clone(), document);
        Ok(id)
    }

    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<Document>, StoreError> {
        Ok(self.kinds.read().get(kind).and_then(|docs| docs.get(id)).cloned())
    }

    async fn delete(&self, kind: &str, id: &EntityId) -> Result<(), StoreError> {
        if let Some(docs) = self.kinds.write().get_mut(kind) {
            docs.remove(id);
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<(EntityId, Document)>, StoreError> {
        let mut rows: Vec<(EntityId, Document)> = {
            let kinds = self.kinds.read();
            let Some(docs) = kinds.get(&query.kind) else {
                return Ok(Vec::new());
            };
            docs.iter()
                .filter(|(_, doc)| match &query.filter {
                    Some(filter) => doc.get(&filter.field) == Some(&filter.value),
                    None => true,
                })
                .map(|(id, doc)| (id.clone(), doc.clone()))
                .collect()
        };

        if let Some((field, direction)) = &query.order {
            // Entities lacking the sort property are left out, as the
            // managed store does for ordered queries.
            rows.retain(|(_, doc)| doc.contains_key(field));
            rows.sort_by(|(_, a), (_, b)| {
                let ord = compare_values(&a[field.as_str()], &b[field.as_str()]);
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        Ok(rows)
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Filter;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn put_without_id_allocates_distinct_ids() {
        let store = MemoryStore::new();
        let a = store.put("players", None, doc(json!({"Name": "a"}))).await.unwrap();
        let b = store.put("players", None, doc(json!({"Name": "b"}))).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len("players"), 2);
    }

    #[tokio::test]
    async fn put_with_id_overwrites_whole_document() {
        let store = MemoryStore::new();
        let id = EntityId::Name("Jogoo Club".into());
        store
            .put("standings", Some(&id), doc(json!({"points": 6, "won": 3})))
            .await
            .unwrap();
        store
            .put("standings", Some(&id), doc(json!({"points": 10})))
            .await
            .unwrap();

        let stored = store.get("standings", &id).await.unwrap().unwrap();
        assert_eq!(stored, doc(json!({"points": 10})));
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = MemoryStore::new();
        for (name, team, points) in [("a", "X", 3), ("b", "Y", 9), ("c", "X", 7)] {
            store
                .put("players", None, doc(json!({"Name": name, "Team": team, "points": points})))
                .await
                .unwrap();
        }

        let rows = store
            .query(
                &Query::kind("players")
                    .filter(Filter::eq("Team", "X"))
                    .order("points", Direction::Descending),
            )
            .await
            .unwrap();
        let names: Vec<_> = rows.iter().map(|(_, d)| d["Name"].clone()).collect();
        assert_eq!(names, vec![json!("c"), json!("a")]);
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let store = MemoryStore::new();
        store.delete("players", &EntityId::Numeric(42)).await.unwrap();
        assert!(store.get("players", &EntityId::Numeric(42)).await.unwrap().is_none());
    }

    #[test]
    fn compare_values_orders_by_type_then_value() {
        assert_eq!(compare_values(&json!(null), &json!(1)), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }
}
