//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Handles are constructed by the composing application and injected;
//! tc-core never reaches for a process-wide client.

use async_trait::async_trait;

use crate::document::{BatchResult, Document, FieldChange, Filter, WriteOp};
use crate::error::{IdentityError, StoreError};
use crate::models::Identity;

/// Document persistence contract: per-document CRUD, equality queries and
/// all-or-nothing write batches with store-side increments.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Unconditional upsert.
    async fn set(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    /// Documents matching every filter, in ascending id order.
    async fn query(&self, collection: &str, filters: &[Filter])
        -> Result<Vec<Document>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Applies every op or none of them. Preconditions are checked against
    /// the state produced by earlier ops of the same batch.
    async fn commit(&self, batch: Vec<WriteOp>) -> Result<BatchResult, StoreError>;

    /// Partial update of an existing document; returns it as written.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Vec<FieldChange>,
    ) -> Result<Document, StoreError> {
        let mut written = self
            .commit(vec![WriteOp::update(collection, id, changes)])
            .await?;
        written
            .pop()
            .flatten()
            .ok_or_else(|| StoreError::Malformed(format!("update of {collection}/{id} returned nothing")))
    }
}

/// Account and token contract, backed by an external identity service.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Registers a new account and returns its identity.
    async fn sign_up(&self, email: &str, password: &str, name: &str)
        -> Result<Identity, IdentityError>;

    /// Checks email/password credentials.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;

    /// Issues a bearer token for an identity.
    async fn issue_token(&self, identity: &Identity) -> Result<String, IdentityError>;

    /// Resolves a bearer token to the caller it was issued for.
    async fn verify(&self, token: &str) -> Result<Identity, IdentityError>;

    /// Invalidates a token before its natural expiry.
    async fn revoke(&self, token: &str) -> Result<(), IdentityError>;
}

/// Object storage contract for user photos.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Saves `data` under `bucket`/`prefix` and returns its public URL.
    /// The final object name is chosen by the store.
    async fn upload(
        &self,
        bucket: &str,
        prefix: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String>;
}
