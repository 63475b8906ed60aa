use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRef},
    http::HeaderName,
    routing::get,
};
use utoipa::OpenApi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod hosting;
pub mod models;
pub mod repository;

// Routing split by access level (Public, Protected).
pub mod routes;
use routes::{protected, public};

// --- Public Re-exports ---

pub use auth::TokenValidator;
pub use config::AppConfig;
pub use error::ApiError;
pub use hosting::{ImageHostState, ImageKitClient, InMemoryImageHost};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and `ToSchema` models.
/// Served as JSON at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_albums, handlers::create_album, handlers::patch_album,
        handlers::delete_album, handlers::get_images, handlers::upload_image,
        handlers::delete_image, handlers::get_client_config
    ),
    components(
        schemas(
            models::Album, models::Image, models::CreateAlbumRequest, models::PatchAlbumRequest,
            models::UploadImageForm, models::AlbumsResponse, models::ImagesResponse,
            models::DeletedResponse, models::ClientConfig,
            error::ErrorEnvelope, error::ErrorMessage,
        )
    ),
    tags(
        (name = "album-vault", description = "Album and image API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container for every service a handler can reach. Cloning is cheap;
/// all members are reference counted or small.
#[derive(Clone)]
pub struct AppState {
    /// Album and image rows.
    pub repo: RepositoryState,
    /// External store for the image bytes.
    pub hosting: ImageHostState,
    /// Bearer token verification used by the `Authorized<P>` guard.
    pub tokens: TokenValidator,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Handlers and extractors pull only the slice of state they need.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for ImageHostState {
    fn from_ref(app_state: &AppState) -> ImageHostState {
        app_state.hosting.clone()
    }
}

impl FromRef<AppState> for TokenValidator {
    fn from_ref(app_state: &AppState) -> TokenValidator {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies global middleware and registers the state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let body_limit = state.config.max_upload_bytes;

    // 2. Base Router Assembly
    let base_router = Router::new()
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .merge(public::public_routes())
        .merge(protected::protected_routes())
        // Unknown paths and unsupported methods answer with the JSON envelope.
        .fallback(error::route_not_found)
        .method_not_allowed_fallback(error::method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `TraceLayer` span so every log line of one request carries its `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
