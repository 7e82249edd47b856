//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use concierge_core::config::ServerConfig;
use concierge_core::{ConciergeConfig, ConciergeError};

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/ws/chat/{client_id}", get(handlers::ws_chat));

    let limiter = RateLimiter::new(u64::from(server.rate_limit_per_sec));
    let api_routes = Router::new()
        .route("/api/stats/{client_id}", get(handlers::stats))
        .route("/api/clear_memory/{client_id}", post(handlers::clear_memory))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(limiter));

    public_routes
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.allowed_origins))
        .with_state(state)
}

/// Open CORS when no origins are configured, otherwise only those listed.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    if allowed_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}

/// Start the HTTP server on the configured address and serve until
/// Ctrl-C.
pub async fn start_server(config: &ConciergeConfig, state: AppState) -> Result<(), ConciergeError> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state, &config.server);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ConciergeError::Api(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Serving on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ConciergeError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
