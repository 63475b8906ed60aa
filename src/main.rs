use album_vault::{
    AppState,
    auth::TokenValidator,
    config::{AppConfig, Env},
    create_router,
    hosting::{ImageHostState, ImageKitClient, InMemoryImageHost},
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes Configuration, Logging, Database, Image Hosting, Token Validation and the
/// HTTP Server, in that order. Any failure before the server is listening aborts startup.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and info for the HTTP layer.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "album_vault=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to connect to Postgres"))?;

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .inspect_err(|e| tracing::error!(error = %e, "failed to apply migrations"))?;
    let repo = Arc::new(postgres) as RepositoryState;

    // 5. Image Hosting
    // Local runs without ImageKit credentials keep uploads in memory.
    let hosting = match &config.imagekit {
        Some(imagekit) => Arc::new(ImageKitClient::new(imagekit)) as ImageHostState,
        None => {
            tracing::warn!("ImageKit is not configured; uploads are kept in memory");
            Arc::new(InMemoryImageHost::new()) as ImageHostState
        }
    };

    // 6. Token Validation
    let tokens = TokenValidator::from_config(&config);
    if config.auth0.is_none() {
        tracing::warn!("Auth0 is not configured; accepting HS256 tokens signed with the dev secret");
    }

    // 7. Unified State Assembly
    let port = config.port;
    let app_state = AppState {
        repo,
        hosting,
        tokens,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!("Listening on 0.0.0.0:{port}");
    tracing::info!("OpenAPI document available at: http://localhost:{port}/api-docs/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}
