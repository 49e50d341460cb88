//! SQLite-backed document store.
//!
//! Documents live as JSON text in a single `entities` table. Filters and
//! sort keys are evaluated with `json_extract`, which keeps the query
//! surface identical to the managed store (one equality filter, one order).

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};

use super::{Direction, Document, EntityId, EntityStore, Query, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    key: String,
    numeric: bool,
    body: String,
}

impl EntityRow {
    fn into_entry(self) -> Result<(EntityId, Document), StoreError> {
        let id = if self.numeric {
            let id = self
                .key
                .parse()
                .map_err(|_| StoreError::Decode(format!("invalid numeric key {}", self.key)))?;
            EntityId::Numeric(id)
        } else {
            EntityId::Name(self.key)
        };
        let body = serde_json::from_str(&self.body).map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok((id, body))
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory database is a separate database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS entities (
                   kind TEXT NOT NULL,
                   key TEXT NOT NULL,
                   numeric INTEGER NOT NULL,
                   body TEXT NOT NULL,
                   PRIMARY KEY (kind, key, numeric)
               )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS entity_ids (
                   id INTEGER PRIMARY KEY AUTOINCREMENT,
                   kind TEXT NOT NULL
               )"#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn allocate_id(&self, kind: &str) -> Result<i64, StoreError> {
        let result = sqlx::query(r#"INSERT INTO entity_ids (kind) VALUES (?)"#)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }
}

fn key_parts(id: &EntityId) -> (String, bool) {
    match id {
        EntityId::Numeric(id) => (id.to_string(), true),
        EntityId::Name(name) => (name.clone(), false),
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> Result<(), StoreError> {
    match value {
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Bool(b) => {
            builder.push_bind(i64::from(*b));
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                builder.push_bind(i);
            }
            None => {
                builder.push_bind(n.as_f64().unwrap_or_default());
            }
        },
        other => {
            return Err(StoreError::Encode(format!(
                "unsupported filter value {other}"
            )))
        }
    }
    Ok(())
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn put(
        &self,
        kind: &str,
        id: Option<&EntityId>,
        document: Document,
    ) -> Result<EntityId, StoreError> {
        let id = match id {
            Some(id) => id.clone(),
            None => EntityId::Numeric(self.allocate_id(kind).await?),
        };
        let (key, numeric) = key_parts(&id);
        let body = serde_json::to_string(&document).map_err(|e| StoreError::Encode(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO entities (kind, key, numeric, body) VALUES (?, ?, ?, ?)
               ON CONFLICT (kind, key, numeric) DO UPDATE SET body = excluded.body"#,
        )
        .bind(kind)
        .bind(key)
        .bind(numeric)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get(&self, kind: &str, id: &EntityId) -> Result<Option<Document>, StoreError> {
        let (key, numeric) = key_parts(id);
        let row = sqlx::query_as::<_, EntityRow>(
            r#"SELECT key, numeric, body FROM entities WHERE kind = ? AND key = ? AND numeric = ?"#,
        )
        .bind(kind)
        .bind(key)
        .bind(numeric)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row.into_entry().map(|(_, doc)| doc)).transpose()
    }

    async fn delete(&self, kind: &str, id: &EntityId) -> Result<(), StoreError> {
        let (key, numeric) = key_parts(id);
        sqlx::query(r#"DELETE FROM entities WHERE kind = ? AND key = ? AND numeric = ?"#)
            .bind(kind)
            .bind(key)
            .bind(numeric)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<(EntityId, Document)>, StoreError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT key, numeric, body FROM entities WHERE kind = ");
        builder.push_bind(query.kind.clone());

        if let Some(filter) = &query.filter {
            builder.push(" AND json_extract(body, ");
            builder.push_bind(json_path(&filter.field));
            builder.push(") = ");
            push_value(&mut builder, &filter.value)?;
        }

        if let Some((field, direction)) = &query.order {
            builder.push(" AND json_type(body, ");
            builder.push_bind(json_path(field));
            builder.push(") IS NOT NULL ORDER BY json_extract(body, ");
            builder.push_bind(json_path(field));
            builder.push(match direction {
                Direction::Ascending => ") ASC",
                Direction::Descending => ") DESC",
            });
        }

        let rows = builder
            .build_query_as::<EntityRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(EntityRow::into_entry).collect()
    }
}
