//! services/api/src/bin/api.rs

use api_lib::{
    adapters::PgStore,
    config::{Config, StoreConfig},
    error::ApiError,
    web::{rest::ApiDoc, router, session_cache::SessionCache, state::AppState},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    Router,
};
use schoolhub_core::{EntityStore, InMemoryStore, SystemClock};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Select the Store Backend ---
    let store: Arc<dyn EntityStore> = match &config.store {
        StoreConfig::Postgres { database_url } => {
            info!("Connecting to database...");
            let pg = PgStore::connect(
                database_url,
                config.database_max_connections,
                config.store_call_timeout,
            )
            .await?;
            info!("Running database migrations...");
            pg.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(pg)
        }
        StoreConfig::Memory => {
            warn!("Using the in-memory store; all data is lost on shutdown");
            Arc::new(InMemoryStore::new())
        }
    };

    // --- 3. Build the Shared AppState ---
    let session_cache = Arc::new(SessionCache::new(config.session_dedup_ttl));
    let app_state = Arc::new(AppState::new(
        store,
        Arc::new(SystemClock),
        config.clone(),
        session_cache.clone(),
    ));

    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(session_cache.run_sweeper(shutdown.clone()));

    // --- 4. Create the Web Router ---
    let origins: Vec<HeaderValue> = config
        .front_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = router(app_state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 6. Stop Background Work ---
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Session cache sweeper ended abnormally: {}", e);
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
