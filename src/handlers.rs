use crate::{
    AppState,
    auth::{Authorized, DeleteAlbums, DeleteImages, PatchAlbums, PostAlbums, PostImages},
    error::{ApiError, ErrorEnvelope},
    models::{
        AlbumsResponse, ClientConfig, CreateAlbumRequest, DeletedResponse, ImagesResponse,
        NewImage, PatchAlbumRequest, UploadImageForm,
    },
};
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Multipart, State, multipart::MultipartRejection},
};
use bytes::Bytes;

/// File name sent to the image host when the upload carries none.
pub const DEFAULT_UPLOAD_NAME: &str = "image.jpeg";

// --- Extractors ---

/// AppJson
///
/// `axum::Json` whose rejection is an `ApiError`, so unreadable bodies get the
/// standard envelope instead of axum's plain-text reply.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// AppPath
///
/// `axum::extract::Path` whose rejection is an `ApiError` (a non-numeric id is a 404).
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// Path ids are unsigned on the wire, so `-1` never matches a route. Values past the
/// store's `i32` range cannot name a row either.
fn record_id(raw: u32) -> Result<i32, ApiError> {
    i32::try_from(raw).map_err(|_| ApiError::RouteNotFound)
}

// --- Album Handlers ---

/// get_albums
///
/// [Public Route] Lists every album in id order. An empty store is reported as a 400,
/// not as an empty list.
#[utoipa::path(
    get,
    path = "/albums",
    responses(
        (status = 200, description = "Albums in id order", body = AlbumsResponse),
        (status = 400, description = "No albums to show", body = ErrorEnvelope),
        (status = 422, description = "Unprocessable", body = ErrorEnvelope)
    )
)]
pub async fn get_albums(State(state): State<AppState>) -> Result<Json<AlbumsResponse>, ApiError> {
    let albums = state.repo.list_albums().await?;
    if albums.is_empty() {
        return Err(ApiError::NoAlbumsToShow);
    }
    Ok(Json(AlbumsResponse::new(albums)))
}

/// create_album
///
/// [Protected Route: `post:albums`] Creates an album from a non-empty `albumName`.
#[utoipa::path(
    post,
    path = "/albums",
    request_body = CreateAlbumRequest,
    responses(
        (status = 200, description = "Created", body = AlbumsResponse),
        (status = 400, description = "Missing albumName", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid token", body = ErrorEnvelope),
        (status = 403, description = "Missing permission", body = ErrorEnvelope),
        (status = 422, description = "Unprocessable", body = ErrorEnvelope)
    )
)]
pub async fn create_album(
    auth: Authorized<PostAlbums>,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAlbumRequest>,
) -> Result<Json<AlbumsResponse>, ApiError> {
    let name = payload
        .album_name
        .filter(|name| !name.is_empty())
        .ok_or(ApiError::MissingAlbumName)?;

    let album = state.repo.create_album(&name).await?;
    tracing::info!(album_id = album.id, subject = ?auth.claims.sub, "album created");
    Ok(Json(AlbumsResponse::new(vec![album])))
}

/// patch_album
///
/// [Protected Route: `patch:albums`] Renames an album. The presence of `newName` is
/// checked before the album lookup, so a missing name on an unknown id is still a 400.
#[utoipa::path(
    patch,
    path = "/albums/{id}",
    params(("id" = u32, Path, description = "Album id")),
    request_body = PatchAlbumRequest,
    responses(
        (status = 200, description = "Renamed", body = AlbumsResponse),
        (status = 400, description = "Missing newName", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid token", body = ErrorEnvelope),
        (status = 403, description = "Missing permission", body = ErrorEnvelope),
        (status = 404, description = "No album found", body = ErrorEnvelope),
        (status = 422, description = "Unprocessable", body = ErrorEnvelope)
    )
)]
pub async fn patch_album(
    auth: Authorized<PatchAlbums>,
    State(state): State<AppState>,
    AppPath(id): AppPath<u32>,
    AppJson(payload): AppJson<PatchAlbumRequest>,
) -> Result<Json<AlbumsResponse>, ApiError> {
    let id = record_id(id)?;
    let new_name = payload.new_name.ok_or(ApiError::MissingNewName)?;

    let album = state
        .repo
        .rename_album(id, &new_name)
        .await?
        .ok_or(ApiError::AlbumNotFound)?;
    tracing::info!(album_id = id, subject = ?auth.claims.sub, "album renamed");
    Ok(Json(AlbumsResponse::new(vec![album])))
}

/// delete_album
///
/// [Protected Route: `delete:albums`] Deletes an album. Images are not cascaded: while
/// the album still owns images the store refuses and the response is a 422.
#[utoipa::path(
    delete,
    path = "/albums/{id}",
    params(("id" = u32, Path, description = "Album id")),
    responses(
        (status = 200, description = "Deleted", body = DeletedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorEnvelope),
        (status = 403, description = "Missing permission", body = ErrorEnvelope),
        (status = 404, description = "No album found", body = ErrorEnvelope),
        (status = 422, description = "Album still owns images", body = ErrorEnvelope)
    )
)]
pub async fn delete_album(
    auth: Authorized<DeleteAlbums>,
    State(state): State<AppState>,
    AppPath(id): AppPath<u32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = record_id(id)?;
    if !state.repo.delete_album(id).await? {
        return Err(ApiError::AlbumNotFound);
    }
    tracing::info!(album_id = id, subject = ?auth.claims.sub, "album deleted");
    Ok(Json(DeletedResponse::new(id)))
}

// --- Image Handlers ---

/// get_images
///
/// [Public Route] Lists the images of one album in id order. No images (including an
/// unknown album) is a 400.
#[utoipa::path(
    get,
    path = "/albums/{id}/images",
    params(("id" = u32, Path, description = "Album id")),
    responses(
        (status = 200, description = "Images in id order", body = ImagesResponse),
        (status = 400, description = "No images to show", body = ErrorEnvelope),
        (status = 422, description = "Unprocessable", body = ErrorEnvelope)
    )
)]
pub async fn get_images(
    State(state): State<AppState>,
    AppPath(album_id): AppPath<u32>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let album_id = record_id(album_id)?;
    let images = state.repo.list_images(album_id).await?;
    if images.is_empty() {
        return Err(ApiError::NoImagesToShow);
    }
    Ok(Json(ImagesResponse::new(images)))
}

/// upload_image
///
/// [Protected Route: `post:images`] Accepts a multipart `file` field, hands the bytes
/// to the image host and records the returned metadata.
///
/// *Ordering*: the remote upload happens before the local insert and the two are not
/// atomic. If the insert fails the hosted file is left behind and logged.
#[utoipa::path(
    post,
    path = "/albums/{id}/images",
    params(("id" = u32, Path, description = "Album id")),
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Uploaded", body = ImagesResponse),
        (status = 400, description = "No file in upload request", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid token", body = ErrorEnvelope),
        (status = 403, description = "Missing permission", body = ErrorEnvelope),
        (status = 422, description = "Unknown album or image host failure", body = ErrorEnvelope)
    )
)]
pub async fn upload_image(
    auth: Authorized<PostImages>,
    State(state): State<AppState>,
    AppPath(album_id): AppPath<u32>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImagesResponse>, ApiError> {
    let album_id = record_id(album_id)?;
    let mut multipart = multipart?;
    let (file_name, bytes) = read_file_field(&mut multipart)
        .await?
        .ok_or(ApiError::MissingFile)?;

    if state.repo.get_album(album_id).await?.is_none() {
        return Err(ApiError::UploadAlbumMissing(album_id));
    }

    let hosted = state.hosting.upload(bytes, &file_name).await?;

    let (w, h) = match (i32::try_from(hosted.width), i32::try_from(hosted.height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => {
            return Err(ApiError::Unprocessable(format!(
                "dimensions {}x{} out of range",
                hosted.width, hosted.height
            )));
        }
    };

    let image = state
        .repo
        .create_image(NewImage {
            w,
            h,
            url: hosted.url,
            external_id: hosted.file_id.clone(),
            album_id,
        })
        .await
        .inspect_err(|e| {
            tracing::error!(
                file_id = %hosted.file_id,
                error = %e,
                "image row insert failed after upload; hosted file is orphaned"
            );
        })?;

    tracing::info!(
        image_id = image.id,
        album_id,
        subject = ?auth.claims.sub,
        "image uploaded"
    );
    Ok(Json(ImagesResponse::new(vec![image])))
}

/// delete_image
///
/// [Protected Route: `delete:images`] Deletes the hosted file first, then the row.
/// If the host refuses, the row is kept and the response is a 422.
#[utoipa::path(
    delete,
    path = "/images/{id}",
    params(("id" = u32, Path, description = "Image id")),
    responses(
        (status = 200, description = "Deleted", body = DeletedResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorEnvelope),
        (status = 403, description = "Missing permission", body = ErrorEnvelope),
        (status = 404, description = "No image found", body = ErrorEnvelope),
        (status = 422, description = "Image host failure", body = ErrorEnvelope)
    )
)]
pub async fn delete_image(
    auth: Authorized<DeleteImages>,
    State(state): State<AppState>,
    AppPath(id): AppPath<u32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = record_id(id)?;
    let image = state
        .repo
        .get_image(id)
        .await?
        .ok_or(ApiError::ImageNotFound)?;

    state.hosting.delete(&image.external_id).await?;

    if !state.repo.delete_image(id).await? {
        return Err(ApiError::ImageNotFound);
    }
    tracing::info!(image_id = id, subject = ?auth.claims.sub, "image deleted");
    Ok(Json(DeletedResponse::new(id)))
}

// --- Misc ---

/// get_client_config
///
/// [Public Route] Non-secret settings for the browser front end.
#[utoipa::path(
    get,
    path = "/client-config",
    responses((status = 200, description = "Front-end settings", body = ClientConfig))
)]
pub async fn get_client_config(State(state): State<AppState>) -> Json<ClientConfig> {
    let mut client = ClientConfig::default();
    if let Some(auth0) = &state.config.auth0 {
        client.auth0_domain = auth0.domain.clone();
        client.auth0_client_id = auth0.client_id.clone();
        client.auth0_audience = auth0.audience.clone();
    }
    if let Some(imagekit) = &state.config.imagekit {
        client.imagekit_public_key = imagekit.public_key.clone();
        client.imagekit_url_endpoint = imagekit.url_endpoint.clone();
    }
    Json(client)
}

/// read_file_field
///
/// Scans the form for a `file` field carrying a file name. Text fields of the same name
/// do not count as a file.
async fn read_file_field(multipart: &mut Multipart) -> Result<Option<(String, Bytes)>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Unprocessable(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let file_name = if file_name.is_empty() {
            DEFAULT_UPLOAD_NAME.to_string()
        } else {
            file_name
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Unprocessable(e.body_text()))?;
        return Ok(Some((file_name, bytes)));
    }
    Ok(None)
}
