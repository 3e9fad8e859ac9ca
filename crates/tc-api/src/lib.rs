//! # tc-api
//!
//! The web routing and orchestration layer for TaniCare.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod response;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tc_core::{AccountService, ObjectStorage, RegionDirectory, ThreadAggregator};

/// Photos are the largest bodies the API accepts.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub threads: ThreadAggregator,
    pub regions: Arc<RegionDirectory>,
    pub media: Arc<dyn ObjectStorage>,
}

/// Builds the API router.
///
/// The binary may nest this under a prefix (e.g., `/api/v1`) and add
/// static file serving for uploads next to it.
pub fn router(state: AppState) -> Router {
    use handlers::*;

    Router::new()
        .route("/health", get(health))
        // Accounts
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/photo", post(upload_profile_photo))
        // Region directory
        .route("/regions/suggest", get(suggest_regions))
        .route("/regions/codes", get(region_codes))
        .route("/regions/{code}", get(region_by_code))
        // Threads and interactions
        .route("/threads", get(list_threads).post(create_thread))
        .route("/threads/{thread_id}", get(get_thread))
        .route("/threads/{thread_id}/comments", get(list_comments).post(add_comment))
        .route("/threads/{thread_id}/upvote", post(add_upvote).delete(remove_upvote))
        .route("/threads/{thread_id}/upvotes", get(list_upvoters))
        .route("/threads/{thread_id}/bookmark", post(add_bookmark).delete(remove_bookmark))
        .route("/bookmarks", get(list_bookmarks))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::cors_policy())
        .layer(middleware::standard_middleware())
        .with_state(state)
}
