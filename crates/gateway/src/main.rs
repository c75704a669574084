//! ClassForge API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use classforge_common::{
    ai::{create_provider, ToolRunner},
    config::AppConfig,
    db::{DbPool, Repository, Store},
    lifecycle::ContentLifecycle,
    metrics,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub lifecycle: ContentLifecycle,
    pub tools: ToolRunner,
    pub rate_limiter: Option<Arc<middleware::rate_limit::GlobalRateLimiter>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting ClassForge API Gateway v{}", classforge_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("Prometheus exporter listening on {}", addr);
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Wire the core services over the SQL store
    let store: Arc<dyn Store> = Arc::new(Repository::new(db.clone()));
    let provider = create_provider(&config.ai)?;
    let lifecycle = ContentLifecycle::new(store.clone());
    let tools = ToolRunner::new(store, provider, &config.ai);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        lifecycle,
        tools,
        rate_limiter: middleware::rate_limit::create_rate_limiter(&config.rate_limit),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Rate limiting
    let rate_limit = axum::middleware::from_fn_with_state(
        state.clone(),
        middleware::rate_limit::rate_limit_middleware,
    );

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Content endpoints
        .route("/contents", post(handlers::contents::create_content))
        .route("/contents", get(handlers::contents::list_contents))
        .route("/contents/{id}", get(handlers::contents::get_content))
        .route("/contents/{id}", patch(handlers::contents::update_content))
        .route("/contents/{id}", delete(handlers::contents::delete_content))
        .route("/contents/{id}/submit", post(handlers::contents::submit_content))
        .route(
            "/contents/{id}/visibility",
            post(handlers::contents::change_visibility),
        )

        // Audit endpoints
        .route("/audits/pending", get(handlers::audits::list_pending))
        .route("/audits/{id}/approve", post(handlers::audits::approve))
        .route("/audits/{id}/reject", post(handlers::audits::reject))

        // AI tool endpoints
        .route("/tools", get(handlers::tools::list_tools))
        .route("/tools/{code}/generate", post(handlers::tools::generate));

    // Compose the app
    Router::new()
        .nest("/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .layer(rate_limit)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
