//! # tc-store-memory
//!
//! In-process implementation of `DocumentStore`.
//! Used by tests and by single-node deployments that do not need persistence.
//!
//! A single write lock serializes batches. Each batch is staged against an
//! overlay of the documents it touches and published only when every op's
//! precondition holds, so a failed batch leaves no trace.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tc_core::document::{BatchResult, Document, Filter, WriteOp};
use tc_core::error::StoreError;
use tc_core::traits::DocumentStore;
use tokio::sync::RwLock;
use tracing::debug;

/// Documents of one collection, ordered by id.
type Collection = BTreeMap<String, Document>;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), doc);
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|doc| filters.iter().all(|filter| filter.matches(doc)))
            .cloned()
            .collect())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .and_then(|docs| docs.remove(id))
            .is_some())
    }

    async fn commit(&self, batch: Vec<WriteOp>) -> Result<BatchResult, StoreError> {
        let mut collections = self.collections.write().await;
        let mut staged: HashMap<(String, String), Option<Document>> = HashMap::new();
        let mut results = Vec::with_capacity(batch.len());

        for op in batch {
            let (collection, id) = op.target();
            let key = (collection.to_string(), id.to_string());
            let current = match staged.get(&key) {
                Some(entry) => entry.clone(),
                None => collections
                    .get(collection)
                    .and_then(|docs| docs.get(id))
                    .cloned(),
            };

            let next = match op {
                WriteOp::Create { collection, id, doc } => {
                    if current.is_some() {
                        return Err(StoreError::AlreadyExists { collection, id });
                    }
                    Some(doc)
                }
                WriteOp::Set { doc, .. } => Some(doc),
                WriteOp::Update {
                    collection,
                    id,
                    changes,
                } => {
                    let Some(mut doc) = current else {
                        return Err(StoreError::Missing { collection, id });
                    };
                    for change in &changes {
                        change.apply(&mut doc);
                    }
                    Some(doc)
                }
                WriteOp::Delete { collection, id } => {
                    if current.is_none() {
                        return Err(StoreError::Missing { collection, id });
                    }
                    None
                }
            };

            results.push(next.clone());
            staged.insert(key, next);
        }

        debug!(writes = staged.len(), "Publishing batch");
        for ((collection, id), doc) in staged {
            match doc {
                Some(doc) => {
                    collections.entry(collection).or_default().insert(id, doc);
                }
                None => {
                    if let Some(docs) = collections.get_mut(&collection) {
                        docs.remove(&id);
                    }
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tc_core::document::FieldChange;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_trace() {
        let store = MemoryDocumentStore::new();
        store
            .set("threads", "t1", doc(json!({ "upVotes": 0 })))
            .await
            .unwrap();
        store.set("upvotes", "t1_u1", doc(json!({}))).await.unwrap();

        let err = store
            .commit(vec![
                WriteOp::update("threads", "t1", vec![FieldChange::increment("upVotes", 1)]),
                WriteOp::create("upvotes", "t1_u1", doc(json!({}))),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let thread = store.get("threads", "t1").await.unwrap().unwrap();
        assert_eq!(thread["upVotes"], json!(0));
    }

    #[tokio::test]
    async fn test_ops_see_earlier_ops_of_same_batch() {
        let store = MemoryDocumentStore::new();
        let written = store
            .commit(vec![
                WriteOp::create("threads", "t1", doc(json!({ "totalComments": 0 }))),
                WriteOp::update("threads", "t1", vec![FieldChange::increment("totalComments", 1)]),
                WriteOp::delete("threads", "t1"),
            ])
            .await
            .unwrap();

        assert_eq!(written[1].as_ref().unwrap()["totalComments"], json!(1));
        assert!(written[2].is_none());
        assert!(store.get("threads", "t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_of_missing_document_fails() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update("threads", "ghost", vec![FieldChange::increment("upVotes", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Missing { collection, id } if collection == "threads" && id == "ghost"));
    }

    #[tokio::test]
    async fn test_query_filters_by_equality_in_id_order() {
        let store = MemoryDocumentStore::new();
        store.set("upvotes", "b", doc(json!({ "threadId": "t1", "userId": "u2" }))).await.unwrap();
        store.set("upvotes", "a", doc(json!({ "threadId": "t1", "userId": "u1" }))).await.unwrap();
        store.set("upvotes", "c", doc(json!({ "threadId": "t2", "userId": "u1" }))).await.unwrap();

        let hits = store
            .query("upvotes", &[Filter::eq("threadId", "t1")])
            .await
            .unwrap();
        let users: Vec<_> = hits.iter().map(|d| d["userId"].clone()).collect();
        assert_eq!(users, vec![json!("u1"), json!("u2")]);

        assert!(store.delete("upvotes", "a").await.unwrap());
        assert!(!store.delete("upvotes", "a").await.unwrap());
    }
}
