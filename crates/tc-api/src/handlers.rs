//! # tc-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    Json,
};
use serde::Deserialize;
use tc_core::directory::DEFAULT_SUGGESTION_LIMIT;
use tc_core::{AppError, ProfileUpdate};
use tracing::debug;

use crate::auth::AuthUser;
use crate::response::{ApiError, ApiResponse};
use crate::AppState;

pub type ApiResult = Result<ApiResponse, ApiError>;

pub const THREAD_BUCKET: &str = "threads";

// ── Request bodies ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub region_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegionQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

/// A file part of a multipart form.
struct Upload {
    data: Vec<u8>,
    content_type: String,
}

/// Reads the named text field (if any) and the named file field, ignoring the rest.
async fn read_form(
    mut multipart: Multipart,
    text_field: Option<&str>,
    file_field: &str,
) -> Result<(Option<String>, Option<Upload>), ApiError> {
    let mut text = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if Some(name.as_str()) == text_field {
            text = Some(field.text().await?);
        } else if name == file_field {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await?.to_vec();
            if !data.is_empty() {
                upload = Some(Upload { data, content_type });
            }
        } else {
            debug!(field = %name, "Ignoring multipart field");
        }
    }
    Ok((text, upload))
}

// ── Health ──────────────────────────────────────────────────────────────────

pub async fn health() -> ApiResult {
    Ok(ApiResponse::ok("ok"))
}

// ── Accounts ────────────────────────────────────────────────────────────────

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let session = state
        .accounts
        .sign_up(
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
            req.name.as_deref().unwrap_or_default(),
        )
        .await?;
    ApiResponse::created("User created successfully").with("signupResult", &session)
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let session = state
        .accounts
        .log_in(
            req.email.as_deref().unwrap_or_default(),
            req.password.as_deref().unwrap_or_default(),
        )
        .await?;
    ApiResponse::ok("success").with("loginResult", &session)
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    state.accounts.log_out(&user.token).await?;
    Ok(ApiResponse::ok("Logout successful"))
}

pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let profile = state.accounts.profile(&user.identity.uid).await?;
    ApiResponse::ok("success").with("profile", &profile)
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let update = ProfileUpdate {
        name: req.name,
        region_code: req.region_code,
    };
    let profile = state.accounts.update_profile(&user.identity.uid, update).await?;
    ApiResponse::ok("Profile updated").with("profile", &profile)
}

pub async fn upload_profile_photo(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult {
    let (_, photo) = read_form(multipart, None, "photo").await?;
    let photo = photo.ok_or_else(|| AppError::Validation("photo is required".into()))?;
    let profile = state
        .accounts
        .set_profile_photo(&user.identity.uid, photo.data, &photo.content_type)
        .await?;
    ApiResponse::ok("Profile photo updated").with("profile", &profile)
}

// ── Regions ─────────────────────────────────────────────────────────────────

fn required_query(query: &RegionQuery) -> Result<&str, ApiError> {
    match query.q.as_deref().map(str::trim) {
        Some(q) if !q.is_empty() => Ok(q),
        _ => Err(AppError::Validation("query parameter q is required".into()).into()),
    }
}

pub async fn suggest_regions(
    State(state): State<AppState>,
    query: Result<Query<RegionQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let q = required_query(&query)?;
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
    let regions = state.regions.suggest_by_prefix(q, limit);
    ApiResponse::ok("success").with("regions", &regions)
}

pub async fn region_codes(
    State(state): State<AppState>,
    query: Result<Query<RegionQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let q = required_query(&query)?;
    let codes = state.regions.codes_by_prefix(q);
    ApiResponse::ok("success").with("codes", &codes)
}

pub async fn region_by_code(State(state): State<AppState>, Path(code): Path<String>) -> ApiResult {
    let region = state
        .regions
        .by_code(&code)
        .ok_or_else(|| AppError::not_found("region", code.as_str()))?;
    ApiResponse::ok("success").with("region", region)
}

// ── Threads ─────────────────────────────────────────────────────────────────

pub async fn list_threads(State(state): State<AppState>, _user: AuthUser) -> ApiResult {
    let threads = state.threads.list_threads().await?;
    ApiResponse::ok("success").with("threads", &threads)
}

/// Multipart form: `body` (text) and optional `photo` (image file).
pub async fn create_thread(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> ApiResult {
    let (body, photo) = read_form(multipart, Some("body"), "photo").await?;
    let body = body.ok_or_else(|| AppError::Validation("body is required".into()))?;
    if body.trim().is_empty() {
        return Err(AppError::Validation("body is required".into()).into());
    }

    let photo_url = match photo {
        Some(photo) => {
            if !photo.content_type.starts_with("image/") {
                return Err(AppError::Validation(format!(
                    "unsupported photo type {}",
                    photo.content_type
                ))
                .into());
            }
            let url = state
                .media
                .upload(THREAD_BUCKET, &user.identity.uid, photo.data, &photo.content_type)
                .await
                .map_err(|err| AppError::Internal(err.to_string()))?;
            Some(url)
        }
        None => None,
    };

    let thread = state
        .threads
        .create_thread(&user.identity.uid, &body, photo_url)
        .await?;
    ApiResponse::created("Thread created successfully").with("thread", &thread)
}

pub async fn get_thread(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    let thread = state.threads.get_thread(&thread_id).await?;
    let comments = state.threads.comments_for_thread(&thread_id).await?;
    ApiResponse::ok("success")
        .with("thread", &thread)?
        .with("comments", &comments)
}

pub async fn list_comments(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    let comments = state.threads.comments_for_thread(&thread_id).await?;
    ApiResponse::ok("success").with("comments", &comments)
}

pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread_id): Path<String>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> ApiResult {
    let Json(req) = payload?;
    let comment = state
        .threads
        .add_comment(
            &thread_id,
            &user.identity.uid,
            req.content.as_deref().unwrap_or_default(),
        )
        .await?;
    ApiResponse::created("Comment added successfully").with("comment", &comment)
}

pub async fn add_upvote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    let count = state.threads.add_upvote(&thread_id, &user.identity.uid).await?;
    ApiResponse::ok("Thread upvoted").with("upVotes", &count)
}

pub async fn remove_upvote(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    let count = state
        .threads
        .remove_upvote(&thread_id, &user.identity.uid)
        .await?;
    ApiResponse::ok("Upvote removed").with("upVotes", &count)
}

pub async fn list_upvoters(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    let user_ids = state.threads.list_upvoter_ids(&thread_id).await?;
    ApiResponse::ok("success").with("upVotedBy", &user_ids)
}

// ── Bookmarks ───────────────────────────────────────────────────────────────

pub async fn add_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    state
        .threads
        .add_bookmark(&user.identity.uid, &thread_id)
        .await?;
    Ok(ApiResponse::created("Thread bookmarked"))
}

pub async fn remove_bookmark(
    State(state): State<AppState>,
    user: AuthUser,
    Path(thread_id): Path<String>,
) -> ApiResult {
    state
        .threads
        .remove_bookmark(&user.identity.uid, &thread_id)
        .await?;
    Ok(ApiResponse::ok("Bookmark removed"))
}

pub async fn list_bookmarks(State(state): State<AppState>, user: AuthUser) -> ApiResult {
    let threads = state.threads.list_bookmarks(&user.identity.uid).await?;
    ApiResponse::ok("success").with("threads", &threads)
}
