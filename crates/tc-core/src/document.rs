//! # Document vocabulary
//!
//! The shapes exchanged with a [`DocumentStore`](crate::traits::DocumentStore):
//! schemaless JSON objects, equality filters and atomic write batches.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored document: a JSON object keyed by field name.
pub type Document = Map<String, Value>;

/// Serializes a model into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed(format!(
            "expected an object, got {other}"
        ))),
    }
}

/// Deserializes a document back into a model.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// `field == value` predicate used by [`DocumentStore::query`](crate::traits::DocumentStore::query).
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field) == Some(&self.value)
    }
}

/// A partial change to one document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    Set { field: String, value: Value },
    /// Store-side add; the result never drops below `floor` when one is given.
    Increment {
        field: String,
        by: i64,
        floor: Option<i64>,
    },
}

impl FieldChange {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        FieldChange::Set {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn increment(field: &str, by: i64) -> Self {
        FieldChange::Increment {
            field: field.to_string(),
            by,
            floor: None,
        }
    }

    pub fn decrement_to_floor(field: &str, by: i64, floor: i64) -> Self {
        FieldChange::Increment {
            field: field.to_string(),
            by: -by,
            floor: Some(floor),
        }
    }

    /// Applies the change in place. A missing or non-integer counter counts as 0.
    pub fn apply(&self, doc: &mut Document) {
        match self {
            FieldChange::Set { field, value } => {
                doc.insert(field.clone(), value.clone());
            }
            FieldChange::Increment { field, by, floor } => {
                let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                let mut next = current.saturating_add(*by);
                if let Some(floor) = floor {
                    next = next.max(*floor);
                }
                doc.insert(field.clone(), Value::from(next));
            }
        }
    }
}

/// One step of an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Fails with `AlreadyExists` when the id is taken.
    Create {
        collection: String,
        id: String,
        doc: Document,
    },
    /// Unconditional upsert.
    Set {
        collection: String,
        id: String,
        doc: Document,
    },
    /// Fails with `Missing` when the document does not exist.
    Update {
        collection: String,
        id: String,
        changes: Vec<FieldChange>,
    },
    /// Fails with `Missing` when the document does not exist.
    Delete { collection: String, id: String },
}

impl WriteOp {
    pub fn create(collection: &str, id: &str, doc: Document) -> Self {
        WriteOp::Create {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        }
    }

    pub fn set(collection: &str, id: &str, doc: Document) -> Self {
        WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            doc,
        }
    }

    pub fn update(collection: &str, id: &str, changes: Vec<FieldChange>) -> Self {
        WriteOp::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            changes,
        }
    }

    pub fn delete(collection: &str, id: &str) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn target(&self) -> (&str, &str) {
        match self {
            WriteOp::Create { collection, id, .. }
            | WriteOp::Set { collection, id, .. }
            | WriteOp::Update { collection, id, .. }
            | WriteOp::Delete { collection, id } => (collection, id),
        }
    }
}

/// Per-op results of a committed batch, in batch order.
/// `Create`, `Set` and `Update` yield the document as written; `Delete` yields `None`.
pub type BatchResult = Vec<Option<Document>>;
