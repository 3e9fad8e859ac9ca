//! # tc-store-sqlite Implementation
//!
//! This module implements `DocumentStore` on a single SQLite table of JSON
//! bodies keyed by `(collection, id)`.
//!
//! Counter changes are evaluated by SQLite (`json_set` over `json_extract`),
//! never read into the process and written back, and every batch runs in one
//! transaction that is rolled back on the first failed precondition.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};
use tc_core::document::{BatchResult, Document, FieldChange, Filter, WriteOp};
use tc_core::error::StoreError;
use tc_core::traits::DocumentStore;
use tracing::{debug, info};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)";

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

// Helpers for mapping between SQL rows and documents
fn json_path(field: &str) -> String {
    format!("$.{field}")
}

fn parse_body(body: &str) -> Result<Document, StoreError> {
    Ok(serde_json::from_str(body)?)
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.into())
}

impl SqliteDocumentStore {
    /// Opens (creating if needed) the database at `url` and ensures the schema.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // Every connection to `sqlite::memory:` is its own database, so an
        // in-memory store must stay on one connection that never expires.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        sqlx::query(SCHEMA).execute(&pool).await?;
        info!(url, "SQLite document store ready");
        Ok(Self { pool })
    }

    async fn apply_update(
        conn: &mut SqliteConnection,
        collection: &str,
        id: &str,
        changes: &[FieldChange],
    ) -> Result<Document, StoreError> {
        let missing = || StoreError::Missing {
            collection: collection.to_string(),
            id: id.to_string(),
        };

        if changes.is_empty() {
            let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
                .map_err(backend)?
                .ok_or_else(missing)?;
            return parse_body(&row.get::<String, _>("body"));
        }

        let mut body = None;
        for change in changes {
            let row = match change {
                FieldChange::Set { field, value } => sqlx::query(
                    "UPDATE documents SET body = json_set(body, ?, json(?))
                     WHERE collection = ? AND id = ? RETURNING body",
                )
                .bind(json_path(field))
                .bind(value.to_string()),
                FieldChange::Increment {
                    field,
                    by,
                    floor: None,
                } => sqlx::query(
                    "UPDATE documents
                     SET body = json_set(body, ?, COALESCE(json_extract(body, ?), 0) + ?)
                     WHERE collection = ? AND id = ? RETURNING body",
                )
                .bind(json_path(field))
                .bind(json_path(field))
                .bind(*by),
                FieldChange::Increment {
                    field,
                    by,
                    floor: Some(floor),
                } => sqlx::query(
                    "UPDATE documents
                     SET body = json_set(body, ?, MAX(?, COALESCE(json_extract(body, ?), 0) + ?))
                     WHERE collection = ? AND id = ? RETURNING body",
                )
                .bind(json_path(field))
                .bind(*floor)
                .bind(json_path(field))
                .bind(*by),
            }
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(backend)?
            .ok_or_else(missing)?;

            body = Some(row.get::<String, _>("body"));
        }

        match body {
            Some(body) => parse_body(&body),
            None => Err(missing()),
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(|row| parse_body(&row.get::<String, _>("body")))
            .transpose()
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
             ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body",
        )
        .bind(collection)
        .bind(id)
        .bind(serde_json::to_string(&doc)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Equality is evaluated by SQLite on the decoded JSON values.
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT body FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());
        for filter in filters {
            builder
                .push(" AND json_extract(body, ")
                .push_bind(json_path(&filter.field))
                .push(") = json_extract(")
                .push_bind(filter.value.to_string())
                .push(", '$')");
        }
        builder.push(" ORDER BY id ASC");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter()
            .map(|row| parse_body(&row.get::<String, _>("body")))
            .collect()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(done.rows_affected() > 0)
    }

    /// Atomic batch.
    ///
    /// Returning early drops `tx`, which rolls back every earlier op.
    async fn commit(&self, batch: Vec<WriteOp>) -> Result<BatchResult, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let mut results = Vec::with_capacity(batch.len());

        for op in batch {
            match op {
                WriteOp::Create { collection, id, doc } => {
                    let done = sqlx::query(
                        "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
                         ON CONFLICT (collection, id) DO NOTHING",
                    )
                    .bind(&collection)
                    .bind(&id)
                    .bind(serde_json::to_string(&doc)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                    if done.rows_affected() == 0 {
                        return Err(StoreError::AlreadyExists { collection, id });
                    }
                    results.push(Some(doc));
                }
                WriteOp::Set { collection, id, doc } => {
                    sqlx::query(
                        "INSERT INTO documents (collection, id, body) VALUES (?, ?, ?)
                         ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body",
                    )
                    .bind(&collection)
                    .bind(&id)
                    .bind(serde_json::to_string(&doc)?)
                    .execute(&mut *tx)
                    .await
                    .map_err(backend)?;
                    results.push(Some(doc));
                }
                WriteOp::Update {
                    collection,
                    id,
                    changes,
                } => {
                    let doc = Self::apply_update(&mut tx, &collection, &id, &changes).await?;
                    results.push(Some(doc));
                }
                WriteOp::Delete { collection, id } => {
                    let done =
                        sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                            .bind(&collection)
                            .bind(&id)
                            .execute(&mut *tx)
                            .await
                            .map_err(backend)?;
                    if done.rows_affected() == 0 {
                        return Err(StoreError::Missing { collection, id });
                    }
                    results.push(None);
                }
            }
        }

        tx.commit().await.map_err(backend)?;
        debug!(ops = results.len(), "Batch committed");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn store() -> SqliteDocumentStore {
        SqliteDocumentStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_increment_and_clamped_decrement() {
        let store = store().await;
        store
            .set("threads", "t1", doc(json!({ "id": "t1", "upVotes": 0 })))
            .await
            .unwrap();

        let up = store
            .update("threads", "t1", vec![FieldChange::increment("upVotes", 1)])
            .await
            .unwrap();
        assert_eq!(up["upVotes"], json!(1));

        for _ in 0..3 {
            store
                .update(
                    "threads",
                    "t1",
                    vec![FieldChange::decrement_to_floor("upVotes", 1, 0)],
                )
                .await
                .unwrap();
        }
        let thread = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(thread["upVotes"], json!(0));
        assert_eq!(thread["id"], json!("t1"));
    }

    #[tokio::test]
    async fn test_failed_create_rolls_back_batch() {
        let store = store().await;
        store.set("threads", "t1", doc(json!({ "upVotes": 0 }))).await.unwrap();
        store.set("upvotes", "t1_u1", doc(json!({ "userId": "u1" }))).await.unwrap();

        let err = store
            .commit(vec![
                WriteOp::update("threads", "t1", vec![FieldChange::increment("upVotes", 1)]),
                WriteOp::create("upvotes", "t1_u1", doc(json!({ "userId": "u1" }))),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let thread = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(thread["upVotes"], json!(0));
    }

    #[tokio::test]
    async fn test_set_change_and_missing_target() {
        let store = store().await;
        store.set("users", "u1", doc(json!({ "name": "Tani" }))).await.unwrap();

        let user = store
            .update("users", "u1", vec![FieldChange::set("regionCode", "11")])
            .await
            .unwrap();
        assert_eq!(user["regionCode"], json!("11"));
        assert_eq!(user["name"], json!("Tani"));

        let err = store
            .commit(vec![WriteOp::delete("users", "ghost")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing { .. }));
    }

    #[tokio::test]
    async fn test_query_matches_json_fields() {
        let store = store().await;
        store.set("comments", "c2", doc(json!({ "threadId": "t1", "n": 2 }))).await.unwrap();
        store.set("comments", "c1", doc(json!({ "threadId": "t1", "n": 1 }))).await.unwrap();
        store.set("comments", "c3", doc(json!({ "threadId": "t2", "n": 3 }))).await.unwrap();

        let hits = store
            .query("comments", &[Filter::eq("threadId", "t1")])
            .await
            .unwrap();
        let ns: Vec<_> = hits.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(ns, vec![json!(1), json!(2)]);

        let all = store.query("comments", &[]).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
