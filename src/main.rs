//! Custody Server - IT asset assignment lifecycle
//!
//! REST API server for issuing, accepting and returning IT assets.

use anyhow::Context;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Custody Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    // Create repository and services
    let repository = Repository::new(pool.clone()).with_lock_timeout(config.database.lock_timeout_ms);
    let services = Services::new(repository, config.assignments.clone());

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
        pool,
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Install the global subscriber, pretty or JSON depending on configuration
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("custody_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Assignments
        .route("/assignments", get(api::assignments::list_assignments))
        .route("/assignments", post(api::assignments::create_assignment))
        .route("/assignments/:id", get(api::assignments::get_assignment))
        .route("/assignments/:id", delete(api::assignments::delete_assignment))
        .route("/assignments/:id/accept", post(api::assignments::accept_assignment))
        .route("/assignments/:id/refuse", post(api::assignments::refuse_assignment))
        .route("/assignments/:id/return", post(api::assignments::request_return))
        .route("/assignments/:id/approve-return", post(api::assignments::approve_return))
        .route("/assignments/:id/reject-return", post(api::assignments::reject_return))
        .route("/assignments/:id/cancel", post(api::assignments::cancel_assignment))
        .route("/assignments/:id/revert", post(api::assignments::revert_assignment))
        // Bundles
        .route("/bundles/:group_id", get(api::assignments::get_bundle))
        // Assets
        .route("/assets", post(api::assets::create_asset))
        .route("/assets/:id", get(api::assets::get_asset))
        .route("/assets/:id", delete(api::assets::delete_asset))
        .route("/assets/:id/status", put(api::assets::update_asset_status))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors),
        )
}
