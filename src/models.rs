use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Album
///
/// A named collection owning zero or more images. Row of the `albums` table; the
/// serialized shape is exactly `{id, name}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Album {
    pub id: i32,
    pub name: String,
}

/// Image
///
/// Metadata for a picture whose bytes live on the external image host.
/// The host's file id is persisted for deletes but never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Image {
    pub id: i32,
    pub w: i32,
    pub h: i32,
    pub url: String,
    #[serde(skip)]
    pub external_id: String,
    pub album_id: i32,
}

/// NewImage
///
/// Everything needed to insert an image row once the host has accepted the upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewImage {
    pub w: i32,
    pub h: i32,
    pub url: String,
    pub external_id: String,
    pub album_id: i32,
}

// --- Request Payloads (Input Schemas) ---

/// CreateAlbumRequest
///
/// Body of `POST /albums`. The name is optional at the type level so that a missing
/// or null name becomes a 400 instead of a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAlbumRequest {
    #[schema(example = "Summer 2024")]
    pub album_name: Option<String>,
}

/// PatchAlbumRequest
///
/// Body of `PATCH /albums/{id}`. Presence of `newName` is required, emptiness is not checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PatchAlbumRequest {
    pub new_name: Option<String>,
}

/// UploadImageForm
///
/// Documents the multipart body of `POST /albums/{id}/images`. The handler reads the
/// form field by field and never builds this type.
#[derive(Debug, ToSchema)]
pub struct UploadImageForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// --- Response Envelopes (Output Schemas) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AlbumsResponse {
    pub success: bool,
    pub albums: Vec<Album>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ImagesResponse {
    pub success: bool,
    pub images: Vec<Image>,
}

/// DeletedResponse
///
/// `{success, delete: id}` returned by both delete routes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct DeletedResponse {
    pub success: bool,
    pub delete: i32,
}

/// ClientConfig
///
/// Public settings a browser front end needs to log in and render hosted images.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClientConfig {
    pub auth0_domain: String,
    pub auth0_client_id: String,
    pub auth0_audience: String,
    pub imagekit_public_key: String,
    pub imagekit_url_endpoint: String,
}

impl AlbumsResponse {
    pub fn new(albums: Vec<Album>) -> Self {
        Self {
            success: true,
            albums,
        }
    }
}

impl ImagesResponse {
    pub fn new(images: Vec<Image>) -> Self {
        Self {
            success: true,
            images,
        }
    }
}

impl DeletedResponse {
    pub fn new(id: i32) -> Self {
        Self {
            success: true,
            delete: id,
        }
    }
}
