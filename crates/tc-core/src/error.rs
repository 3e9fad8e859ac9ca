//! # AppError
//!
//! Centralized error handling for the TaniCare workspace.
//! Port adapters report `StoreError` / `IdentityError`; services surface `AppError`.

use thiserror::Error;

/// The primary error type for all tc-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed request field
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, invalid or revoked token; bad credentials
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (e.g., Thread, Upvote, Region)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Repeat upvote on the same thread by the same user
    #[error("user {user_id} has already upvoted thread {thread_id}")]
    DuplicateVote { thread_id: String, user_id: String },

    /// Resource already exists (e.g., duplicate account email)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., store unreachable)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl Into<String>) -> Self {
        AppError::NotFound(kind.to_string(), id.into())
    }
}

/// A specialized Result type for TaniCare logic.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failures reported by a [`DocumentStore`](crate::traits::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// A `Create` precondition failed
    #[error("document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    /// An `Update` or `Delete` precondition failed
    #[error("document {collection}/{id} does not exist")]
    Missing { collection: String, id: String },

    /// Stored data could not be mapped to or from a document
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Malformed(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing { collection, id } => AppError::NotFound(collection, id),
            StoreError::AlreadyExists { collection, id } => {
                AppError::Conflict(format!("{collection}/{id} already exists"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Failures reported by an [`IdentityProvider`](crate::traits::IdentityProvider).
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("identity backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredentials => AppError::Unauthorized(err.to_string()),
            IdentityError::InvalidToken(_) => AppError::Unauthorized(err.to_string()),
            IdentityError::EmailTaken(_) => AppError::Conflict(err.to_string()),
            IdentityError::Backend(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// Region source could not be read. Fatal at startup.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot open region source {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read region source: {0}")]
    Read(#[from] csv::Error),
}
