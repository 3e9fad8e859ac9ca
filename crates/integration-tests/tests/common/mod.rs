//! Shared fixtures: a fully wired router over the in-memory plugins.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tc_api::AppState;
use tc_auth_simple::SimpleIdentityProvider;
use tc_core::{
    AccountService, DocumentStore, ObjectStorage, Region, RegionDirectory, ThreadAggregator,
};
use tc_storage_local::LocalObjectStorage;
use tc_store_memory::MemoryDocumentStore;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"integration-test-secret-0123456789";
const BOUNDARY: &str = "tanicare-test-boundary";

pub fn regions() -> RegionDirectory {
    RegionDirectory::from_regions(vec![
        Region { code: "11".into(), name: "ACEH".into() },
        Region { code: "11.01".into(), name: "KAB. ACEH SELATAN".into() },
        Region { code: "11.02".into(), name: "KAB. ACEH TENGGARA".into() },
        Region { code: "32".into(), name: "JAWA BARAT".into() },
        Region { code: "32.73".into(), name: "KOTA BANDUNG".into() },
    ])
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<dyn DocumentStore>,
    // Keeps the upload directory alive for the test's duration.
    _media_dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let media_dir = tempfile::tempdir().expect("tempdir");
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let regions = Arc::new(regions());
        let media: Arc<dyn ObjectStorage> = Arc::new(LocalObjectStorage::new(
            media_dir.path().to_path_buf(),
            "/static/uploads".into(),
        ));
        let identity = Arc::new(SimpleIdentityProvider::new(
            store.clone(),
            TEST_SECRET,
            chrono::Duration::hours(1),
        ));

        let state = AppState {
            accounts: AccountService::new(identity, store.clone(), media.clone(), regions.clone()),
            threads: ThreadAggregator::new(store.clone()),
            regions,
            media,
        };

        Self {
            router: tc_api::router(state),
            store,
            _media_dir: media_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.send(request).await
    }

    /// Posts a multipart form. `parts` are `(name, content_type, bytes)`; a
    /// `None` content type makes a plain text field.
    pub async fn multipart(
        &self,
        uri: &str,
        token: &str,
        parts: &[(&str, Option<&str>, &[u8])],
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (name, content_type, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match content_type {
                Some(content_type) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                    );
                }
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .expect("request");
        self.send(request).await
    }

    /// Signs up a fresh account and returns `(user_id, token)`.
    pub async fn sign_up(&self, email: &str, name: &str) -> (String, String) {
        let (status, body) = self
            .json(
                Method::POST,
                "/signup",
                None,
                Some(serde_json::json!({ "email": email, "password": "rahasia123", "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        let result = &body["signupResult"];
        (
            result["userId"].as_str().expect("userId").to_string(),
            result["token"].as_str().expect("token").to_string(),
        )
    }

    /// Creates a text-only thread and returns its id.
    pub async fn create_thread(&self, token: &str, text: &str) -> String {
        let (status, body) = self
            .multipart("/threads", token, &[("body", None, text.as_bytes())])
            .await;
        assert_eq!(status, StatusCode::CREATED, "create thread failed: {body}");
        body["thread"]["id"].as_str().expect("thread id").to_string()
    }
}
