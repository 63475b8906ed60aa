#![allow(dead_code)]

use album_vault::{
    AppConfig, AppState,
    auth::{LOCAL_AUDIENCE, LOCAL_ISSUER, TokenValidator},
    config::LOCAL_DEV_SECRET,
    hosting::{ImageHostState, InMemoryImageHost},
    repository::{MemoryRepository, RepositoryState},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use tower::util::ServiceExt;

pub const ALL_PERMISSIONS: [&str; 5] = [
    "post:albums",
    "patch:albums",
    "delete:albums",
    "post:images",
    "delete:images",
];

pub const BOUNDARY: &str = "album-vault-test-boundary";

/// Shared state plus direct handles on the in-memory services behind it.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub host: Arc<InMemoryImageHost>,
}

impl TestContext {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let host = Arc::new(InMemoryImageHost::new());
        let config = AppConfig::default();
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            hosting: host.clone() as ImageHostState,
            tokens: TokenValidator::from_config(&config),
            config,
        };
        Self { state, repo, host }
    }

    pub fn router(&self) -> Router {
        album_vault::create_router(self.state.clone())
    }
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// HS256 token accepted by the local validator.
pub fn token(permissions: &[&str]) -> String {
    token_with(permissions, LOCAL_ISSUER, LOCAL_AUDIENCE, now() + 3600)
}

pub fn token_with(permissions: &[&str], issuer: &str, audience: &str, exp: u64) -> String {
    let claims = json!({
        "sub": "auth0|tester",
        "permissions": permissions,
        "iss": issuer,
        "aud": audience,
        "exp": exp,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(LOCAL_DEV_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn bearer(permissions: &[&str]) -> String {
    format!("Bearer {}", token(permissions))
}

/// One-part multipart body. `file_name: None` produces a plain text field.
pub fn multipart_body(field: &str, file_name: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    match file_name {
        Some(name) => body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{name}\"\r\nContent-Type: image/jpeg\r\n\r\n"
            )
            .as_bytes(),
        ),
        None => body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{field}\"\r\n\r\n").as_bytes(),
        ),
    }
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn upload_request(uri: &str, auth: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Sends one request through the full router. Non-JSON bodies come back as `Value::Null`.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}
