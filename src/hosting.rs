use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::ImageKitConfig;

const IMAGEKIT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
const IMAGEKIT_FILES_URL: &str = "https://api.imagekit.io/v1/files";

/// HostingError
///
/// Why the image host could not complete a request. Callers treat every variant alike.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("host answered with status {status}")]
    Rejected { status: u16 },
    #[error("unexpected host response: {0}")]
    InvalidResponse(String),
}

/// HostedImage
///
/// What the host reports back about a stored file.
#[derive(Debug, Clone, PartialEq)]
pub struct HostedImage {
    pub file_id: String,
    pub url: String,
    pub width: u32,
    pub height: u32,
}

// 1. ImageHost Contract
/// ImageHost
///
/// Contract for the external service that stores image bytes. Implementations never
/// panic or propagate transport internals; every outcome is a tagged `Result`.
/// Swapping `ImageKitClient` for `InMemoryImageHost` needs no handler changes.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Stores `bytes` under a name derived from `file_name` and returns the hosted metadata.
    async fn upload(&self, bytes: Bytes, file_name: &str) -> Result<HostedImage, HostingError>;

    /// Removes a previously uploaded file by the id the host assigned to it.
    async fn delete(&self, file_id: &str) -> Result<(), HostingError>;
}

/// ImageHostState
///
/// The concrete type used to share the image host across the application state.
pub type ImageHostState = Arc<dyn ImageHost>;

// 2. The Real Implementation (ImageKit)
/// ImageKitClient
///
/// Talks to the ImageKit REST API. Requests authenticate with HTTP basic auth using
/// the private key as the user name and an empty password.
#[derive(Clone)]
pub struct ImageKitClient {
    client: reqwest::Client,
    private_key: String,
    upload_url: String,
    files_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl ImageKitClient {
    pub fn new(config: &ImageKitConfig) -> Self {
        Self::with_endpoints(config, IMAGEKIT_UPLOAD_URL, IMAGEKIT_FILES_URL)
    }

    /// Points the client at alternative API roots (used against local fakes).
    pub fn with_endpoints(config: &ImageKitConfig, upload_url: &str, files_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            private_key: config.private_key.clone(),
            upload_url: upload_url.to_string(),
            files_url: files_url.trim_end_matches('/').to_string(),
        }
    }
}

fn is_success(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::OK || status == reqwest::StatusCode::NO_CONTENT
}

#[async_trait]
impl ImageHost for ImageKitClient {
    /// upload
    ///
    /// Sends the payload base64-encoded in the `file` form field.
    async fn upload(&self, bytes: Bytes, file_name: &str) -> Result<HostedImage, HostingError> {
        let encoded = STANDARD.encode(&bytes);
        let form = reqwest::multipart::Form::new()
            .text("file", encoded)
            .text("fileName", file_name.to_string())
            .text("useUniqueFileName", "true")
            .text("isPrivateFile", "false");

        let response = self
            .client
            .post(&self.upload_url)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !is_success(status) {
            return Err(HostingError::Rejected {
                status: status.as_u16(),
            });
        }

        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| HostingError::InvalidResponse(e.to_string()))?;

        match (body.width, body.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => Ok(HostedImage {
                file_id: body.file_id,
                url: body.url,
                width,
                height,
            }),
            _ => Err(HostingError::InvalidResponse(format!(
                "file {} has no pixel dimensions",
                body.file_id
            ))),
        }
    }

    async fn delete(&self, file_id: &str) -> Result<(), HostingError> {
        let response = self
            .client
            .delete(format!("{}/{}", self.files_url, file_id))
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await?;

        let status = response.status();
        if is_success(status) {
            Ok(())
        } else {
            Err(HostingError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

// 3. The In-Memory Implementation (local runs and tests)
/// InMemoryImageHost
///
/// Keeps "hosted" files in a list instead of calling out. Failures can be switched on
/// at any time so tests can make the host misbehave mid-scenario.
#[derive(Default)]
pub struct InMemoryImageHost {
    failing: AtomicBool,
    next_id: AtomicU64,
    files: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

impl InMemoryImageHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        let host = Self::default();
        host.set_failing(true);
        host
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Ids of files currently stored.
    pub fn stored_files(&self) -> Vec<String> {
        self.files.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Ids passed to successful `delete` calls, in call order.
    pub fn deleted_files(&self) -> Vec<String> {
        self.deleted.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ImageHost for InMemoryImageHost {
    async fn upload(&self, bytes: Bytes, file_name: &str) -> Result<HostedImage, HostingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostingError::Rejected { status: 503 });
        }
        if bytes.is_empty() {
            return Err(HostingError::InvalidResponse(format!(
                "{file_name} is empty"
            )));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let file_id = format!("local_{n}");
        if let Ok(mut files) = self.files.lock() {
            files.push(file_id.clone());
        }

        Ok(HostedImage {
            url: format!("http://localhost/images/{file_id}/{file_name}"),
            file_id,
            width: 800,
            height: 600,
        })
    }

    async fn delete(&self, file_id: &str) -> Result<(), HostingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostingError::Rejected { status: 503 });
        }

        let mut files = self
            .files
            .lock()
            .map_err(|_| HostingError::InvalidResponse("file list poisoned".to_string()))?;
        let Some(position) = files.iter().position(|id| id == file_id) else {
            return Err(HostingError::Rejected { status: 404 });
        };
        files.remove(position);
        drop(files);

        if let Ok(mut deleted) = self.deleted.lock() {
            deleted.push(file_id.to_string());
        }
        Ok(())
    }
}
