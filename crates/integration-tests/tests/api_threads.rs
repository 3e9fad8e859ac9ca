//! Thread, comment, upvote and bookmark routes.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn create_thread_with_photo() {
    let app = TestApp::new();
    let (user_id, token) = app.sign_up("petani@example.com", "Petani").await;

    let (status, body) = app
        .multipart(
            "/threads",
            &token,
            &[
                ("body", None, "Daun jagung menguning".as_bytes()),
                ("photo", Some("image/jpeg"), &b"\xff\xd8\xff fake jpeg"[..]),
            ],
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let thread = &body["thread"];
    assert_eq!(thread["body"], "Daun jagung menguning");
    assert_eq!(thread["ownerId"], user_id.as_str());
    assert_eq!(thread["upVotes"], 0);
    assert_eq!(thread["totalComments"], 0);
    assert!(thread["photoUrl"].as_str().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn create_thread_requires_body() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("kosong@example.com", "Kosong").await;

    let (status, body) = app.multipart("/threads", &token, &[("body", None, &b"   "[..])]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn comments_update_thread_total() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("komentar@example.com", "Komentar").await;
    let thread_id = app.create_thread(&token, "Kapan waktu tanam cabai?").await;
    let uri = format!("/threads/{thread_id}/comments");

    let (status, body) = app
        .json(Method::POST, &uri, Some(&token), Some(json!({ "content": "Awal musim hujan" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["comment"]["threadId"], thread_id.as_str());

    let (status, body) = app
        .json(Method::GET, &format!("/threads/{thread_id}"), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["thread"]["totalComments"], 1);
    assert_eq!(body["comments"][0]["content"], "Awal musim hujan");

    let (status, _) = app
        .json(Method::POST, &uri, Some(&token), Some(json!({ "content": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(
            Method::POST,
            "/threads/missing/comments",
            Some(&token),
            Some(json!({ "content": "halo" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_upvote_is_conflict_and_count_is_unchanged() {
    let app = TestApp::new();
    let (owner_id, token) = app.sign_up("voter@example.com", "Voter").await;
    let thread_id = app.create_thread(&token, "Harga gabah naik").await;
    let uri = format!("/threads/{thread_id}/upvote");

    let (status, body) = app.json(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upVotes"], 1);

    let (status, body) = app.json(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], true);

    let (_, body) = app
        .json(Method::GET, &format!("/threads/{thread_id}/upvotes"), Some(&token), None)
        .await;
    assert_eq!(body["upVotedBy"], json!([owner_id]));

    let (status, body) = app.json(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["upVotes"], 0);

    let (status, _) = app.json(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app
        .json(Method::GET, &format!("/threads/{thread_id}"), Some(&token), None)
        .await;
    assert_eq!(body["thread"]["upVotes"], 0);
}

#[tokio::test]
async fn upvote_on_unknown_thread_is_not_found() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("nothread@example.com", "No Thread").await;
    let (status, _) = app
        .json(Method::POST, "/threads/missing/upvote", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn threads_are_listed_newest_first() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("lister@example.com", "Lister").await;
    let older = app.create_thread(&token, "Lama").await;
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let newer = app.create_thread(&token, "Baru").await;

    let (status, body) = app.json(Method::GET, "/threads", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<_> = body["threads"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![newer, older]);
}

#[tokio::test]
async fn bookmark_routes() {
    let app = TestApp::new();
    let (_, token) = app.sign_up("simpan@example.com", "Simpan").await;
    let thread_id = app.create_thread(&token, "Tips pupuk kandang").await;
    let uri = format!("/threads/{thread_id}/bookmark");

    let (status, _) = app.json(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.json(Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.json(Method::GET, "/bookmarks", Some(&token), None).await;
    assert_eq!(body["threads"][0]["id"], thread_id.as_str());

    let (status, _) = app.json(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.json(Method::GET, "/bookmarks", Some(&token), None).await;
    assert_eq!(body["threads"], json!([]));
}
