use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Unauthenticated, read-only endpoints.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers. Touches neither the store nor the image host.
        .route("/health", get(|| async { "ok" }))
        // GET /client-config
        // Identity provider and image host settings the browser front end needs.
        .route("/client-config", get(handlers::get_client_config))
        // GET /albums
        // Every album in id order; 400 when there are none.
        .route("/albums", get(handlers::get_albums))
        // GET /albums/{id}/images
        // Images of one album in id order; 400 when there are none.
        .route("/albums/{id}/images", get(handlers::get_images))
}
