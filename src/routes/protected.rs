use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, patch, post},
};

/// Protected Router Module
///
/// Album and image mutations. Each handler names its required permission through its
/// `Authorized<P>` argument:
///
/// | Route                        | Permission      |
/// |------------------------------|-----------------|
/// | `POST /albums`               | `post:albums`   |
/// | `PATCH /albums/{id}`         | `patch:albums`  |
/// | `DELETE /albums/{id}`        | `delete:albums` |
/// | `POST /albums/{id}/images`   | `post:images`   |
/// | `DELETE /images/{id}`        | `delete:images` |
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/albums", post(handlers::create_album))
        .route(
            "/albums/{id}",
            patch(handlers::patch_album).delete(handlers::delete_album),
        )
        // Multipart upload; the body limit is set on the outer router.
        .route("/albums/{id}/images", post(handlers::upload_image))
        // Removes the hosted file before the row.
        .route("/images/{id}", delete(handlers::delete_image))
}
