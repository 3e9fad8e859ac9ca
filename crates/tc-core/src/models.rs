//! # Domain Models
//!
//! These structs represent the core entities of TaniCare.
//! Identifiers are UUID v7 strings so that key order follows creation order.
//! Field names are camelCase both on the wire and in stored documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection names used in the document store.
pub mod collections {
    pub const THREADS: &str = "threads";
    pub const COMMENTS: &str = "comments";
    pub const UPVOTES: &str = "upvotes";
    pub const BOOKMARKS: &str = "bookmarks";
    pub const USERS: &str = "users";
}

/// One administrative region (wilayah) row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub code: String,
    pub name: String,
}

/// A top-level post. `up_votes` and `total_comments` are derived counters
/// maintained by the aggregator, never written directly by callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: String,
    pub body: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub up_votes: u64,
    pub total_comments: u64,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub thread_id: String,
    pub content: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
}

/// A single user's vote on a thread. Stored under [`Upvote::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upvote {
    pub thread_id: String,
    pub user_id: String,
    pub vote_type: i32,
}

impl Upvote {
    pub const UP: i32 = 1;

    pub fn new(thread_id: &str, user_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            vote_type: Self::UP,
        }
    }

    /// Deterministic document id; one document per (thread, user) pair.
    pub fn key(thread_id: &str, user_id: &str) -> String {
        format!("{thread_id}_{user_id}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub thread_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn key(user_id: &str, thread_id: &str) -> String {
        format!("{user_id}_{thread_id}")
    }
}

/// Profile data kept alongside the identity provider's account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// A verified caller, as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub name: String,
    pub email: Option<String>,
}

/// Credentials handed back after signup or login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub name: String,
    pub token: String,
}
