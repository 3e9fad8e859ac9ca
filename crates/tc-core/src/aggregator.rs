//! # Thread Aggregator
//!
//! Threads, comments, upvotes and bookmarks on top of a [`DocumentStore`].
//!
//! Derived counters (`totalComments`, `upVotes`) are only ever changed by a
//! store-side increment committed in the same batch as the child write, and
//! upvote uniqueness is a conditional create on `"{threadId}_{userId}"`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::document::{from_document, to_document, FieldChange, Filter, WriteOp};
use crate::error::{AppError, Result, StoreError};
use crate::models::collections::{BOOKMARKS, COMMENTS, THREADS, UPVOTES};
use crate::models::{Bookmark, Comment, Thread, Upvote};
use crate::traits::DocumentStore;

const UP_VOTES: &str = "upVotes";
const TOTAL_COMMENTS: &str = "totalComments";

#[derive(Clone)]
pub struct ThreadAggregator {
    store: Arc<dyn DocumentStore>,
}

impl ThreadAggregator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_thread(
        &self,
        owner_id: &str,
        body: &str,
        photo_url: Option<String>,
    ) -> Result<Thread> {
        let body = required("body", body)?;
        let thread = Thread {
            id: Uuid::now_v7().to_string(),
            body: body.to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
            up_votes: 0,
            total_comments: 0,
            photo_url,
        };

        self.store
            .commit(vec![WriteOp::create(THREADS, &thread.id, to_document(&thread)?)])
            .await?;

        info!(thread_id = %thread.id, owner_id, "Thread created");
        Ok(thread)
    }

    pub async fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        match self.store.get(THREADS, thread_id).await? {
            Some(doc) => Ok(from_document(doc)?),
            None => Err(AppError::not_found("thread", thread_id)),
        }
    }

    /// Every thread, newest first.
    pub async fn list_threads(&self) -> Result<Vec<Thread>> {
        let mut threads = self
            .store
            .query(THREADS, &[])
            .await?
            .into_iter()
            .map(from_document::<Thread>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        threads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(threads)
    }

    pub async fn add_comment(&self, thread_id: &str, owner_id: &str, content: &str) -> Result<Comment> {
        let content = required("content", content)?;
        let comment = Comment {
            id: Uuid::now_v7().to_string(),
            thread_id: thread_id.to_string(),
            content: content.to_string(),
            owner_id: owner_id.to_string(),
            created_at: Utc::now(),
        };

        let batch = vec![
            WriteOp::update(THREADS, thread_id, vec![FieldChange::increment(TOTAL_COMMENTS, 1)]),
            WriteOp::create(COMMENTS, &comment.id, to_document(&comment)?),
        ];
        self.store.commit(batch).await.map_err(|err| match err {
            StoreError::Missing { .. } => AppError::not_found("thread", thread_id),
            other => other.into(),
        })?;

        info!(thread_id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Comments on a thread, oldest first.
    pub async fn comments_for_thread(&self, thread_id: &str) -> Result<Vec<Comment>> {
        self.ensure_thread(thread_id).await?;
        let comments = self
            .store
            .query(COMMENTS, &[Filter::eq("threadId", thread_id)])
            .await?
            .into_iter()
            .map(from_document::<Comment>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    /// Records the caller's vote and returns the thread's new `upVotes`.
    pub async fn add_upvote(&self, thread_id: &str, user_id: &str) -> Result<u64> {
        let key = Upvote::key(thread_id, user_id);
        let batch = vec![
            WriteOp::update(THREADS, thread_id, vec![FieldChange::increment(UP_VOTES, 1)]),
            WriteOp::create(UPVOTES, &key, to_document(&Upvote::new(thread_id, user_id))?),
        ];

        let written = self.store.commit(batch).await.map_err(|err| match err {
            StoreError::AlreadyExists { .. } => {
                warn!(thread_id, user_id, "Duplicate upvote rejected");
                AppError::DuplicateVote {
                    thread_id: thread_id.to_string(),
                    user_id: user_id.to_string(),
                }
            }
            StoreError::Missing { .. } => AppError::not_found("thread", thread_id),
            other => other.into(),
        })?;

        let count = counter_after(written.into_iter().next().flatten(), thread_id)?;
        info!(thread_id, user_id, up_votes = count, "Upvote added");
        Ok(count)
    }

    /// Withdraws the caller's vote and returns the thread's new `upVotes`, never below 0.
    pub async fn remove_upvote(&self, thread_id: &str, user_id: &str) -> Result<u64> {
        let key = Upvote::key(thread_id, user_id);
        let batch = vec![
            WriteOp::delete(UPVOTES, &key),
            WriteOp::update(
                THREADS,
                thread_id,
                vec![FieldChange::decrement_to_floor(UP_VOTES, 1, 0)],
            ),
        ];

        let written = self.store.commit(batch).await.map_err(|err| match err {
            StoreError::Missing { collection, .. } if collection == UPVOTES => {
                AppError::not_found("upvote", key.clone())
            }
            StoreError::Missing { .. } => AppError::not_found("thread", thread_id),
            other => other.into(),
        })?;

        let count = counter_after(written.into_iter().nth(1).flatten(), thread_id)?;
        info!(thread_id, user_id, up_votes = count, "Upvote removed");
        Ok(count)
    }

    pub async fn list_upvoter_ids(&self, thread_id: &str) -> Result<Vec<String>> {
        let votes = self
            .store
            .query(UPVOTES, &[Filter::eq("threadId", thread_id)])
            .await?;
        debug!(thread_id, votes = votes.len(), "Listing upvoters");
        votes
            .into_iter()
            .map(|doc| Ok(from_document::<Upvote>(doc)?.user_id))
            .collect()
    }

    pub async fn add_bookmark(&self, user_id: &str, thread_id: &str) -> Result<Bookmark> {
        self.ensure_thread(thread_id).await?;
        let bookmark = Bookmark {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };
        let key = Bookmark::key(user_id, thread_id);

        self.store
            .commit(vec![WriteOp::create(BOOKMARKS, &key, to_document(&bookmark)?)])
            .await
            .map_err(|err| match err {
                StoreError::AlreadyExists { .. } => {
                    AppError::Conflict(format!("thread {thread_id} is already bookmarked"))
                }
                other => other.into(),
            })?;

        info!(thread_id, user_id, "Bookmark added");
        Ok(bookmark)
    }

    pub async fn remove_bookmark(&self, user_id: &str, thread_id: &str) -> Result<()> {
        let key = Bookmark::key(user_id, thread_id);
        if !self.store.delete(BOOKMARKS, &key).await? {
            return Err(AppError::not_found("bookmark", key));
        }
        info!(thread_id, user_id, "Bookmark removed");
        Ok(())
    }

    /// Threads the user bookmarked, in bookmark order. Dangling bookmarks are skipped.
    pub async fn list_bookmarks(&self, user_id: &str) -> Result<Vec<Thread>> {
        let mut bookmarks = self
            .store
            .query(BOOKMARKS, &[Filter::eq("userId", user_id)])
            .await?
            .into_iter()
            .map(from_document::<Bookmark>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        bookmarks.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let mut threads = Vec::with_capacity(bookmarks.len());
        for bookmark in bookmarks {
            match self.store.get(THREADS, &bookmark.thread_id).await? {
                Some(doc) => threads.push(from_document(doc)?),
                None => warn!(thread_id = %bookmark.thread_id, "Bookmarked thread is gone"),
            }
        }
        Ok(threads)
    }

    async fn ensure_thread(&self, thread_id: &str) -> Result<()> {
        match self.store.get(THREADS, thread_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("thread", thread_id)),
        }
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}

fn counter_after(thread: Option<crate::document::Document>, thread_id: &str) -> Result<u64> {
    let thread = thread.ok_or_else(|| {
        AppError::Internal(format!("store returned no document for thread {thread_id}"))
    })?;
    Ok(from_document::<Thread>(thread)?.up_votes)
}
