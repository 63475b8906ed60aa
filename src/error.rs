use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{auth::AuthError, hosting::HostingError, repository::StoreError};

/// ErrorKind
///
/// The tag every `ApiError` carries. The HTTP status and the public message are
/// derived from the kind alone, never from the error's display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Unauthorized,
    Forbidden,
    MethodNotAllowed,
    Unprocessable,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorKind::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Generic text placed in the envelope for non-auth failures.
    pub fn public_message(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad request",
            ErrorKind::NotFound => "resource not found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::MethodNotAllowed => "method not allowed",
            ErrorKind::Unprocessable => "unprocessable",
        }
    }
}

/// ApiError
///
/// Every failure a handler can produce. Handlers return `Result<_, ApiError>` and the
/// `IntoResponse` impl below is the single place where failures become HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("no albums to show")]
    NoAlbumsToShow,
    #[error("no images to show")]
    NoImagesToShow,
    #[error("no album name in create request")]
    MissingAlbumName,
    #[error("no new name in patch request")]
    MissingNewName,
    #[error("no file in upload request")]
    MissingFile,
    #[error("no album found")]
    AlbumNotFound,
    #[error("no image found")]
    ImageNotFound,
    // Upload into a missing album is reported as unprocessable, not as a 404.
    #[error("album {0} does not exist, nothing to upload into")]
    UploadAlbumMissing(i32),
    #[error("image hosting failed: {0}")]
    ImageHosting(#[from] HostingError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("unprocessable request: {0}")]
    Unprocessable(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("no route matches the request")]
    RouteNotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NoAlbumsToShow
            | ApiError::NoImagesToShow
            | ApiError::MissingAlbumName
            | ApiError::MissingNewName
            | ApiError::MissingFile => ErrorKind::BadRequest,
            ApiError::AlbumNotFound | ApiError::ImageNotFound | ApiError::RouteNotFound => {
                ErrorKind::NotFound
            }
            ApiError::Auth(err) => err.kind(),
            ApiError::MethodNotAllowed => ErrorKind::MethodNotAllowed,
            ApiError::UploadAlbumMissing(_)
            | ApiError::ImageHosting(_)
            | ApiError::Store(_)
            | ApiError::Unprocessable(_) => ErrorKind::Unprocessable,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

/// The `{success:false, error, message}` body shared by every failure response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: u16,
    pub message: ErrorMessage,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Detail {
        code: String,
        description: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = kind.status();

        match kind {
            ErrorKind::Unprocessable => tracing::error!(error = %self, "request failed"),
            _ => tracing::warn!(error = %self, status = status.as_u16(), "request rejected"),
        }

        let message = match &self {
            ApiError::Auth(err) => ErrorMessage::Detail {
                code: err.code().to_string(),
                description: err.to_string(),
            },
            _ => ErrorMessage::Text(kind.public_message().to_string()),
        };

        let body = ErrorEnvelope {
            success: false,
            error: status.as_u16(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

// --- Extractor rejections ---

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        ApiError::RouteNotFound
    }
}

// A request that is not a multipart form has no file in it.
impl From<MultipartRejection> for ApiError {
    fn from(_: MultipartRejection) -> Self {
        ApiError::MissingFile
    }
}

/// Fallback for paths no route matches.
pub async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Fallback for known paths hit with an unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
