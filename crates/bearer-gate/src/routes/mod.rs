//! HTTP routes for Bearer Gate.
//!
//! Defines the Axum router and application state.

use crate::auth::{Authenticator, JwksCache, ValidationPolicy};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Overall per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Authentication gate, owning the process-wide JWKS cache.
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    /// Wire the JWKS cache and validation policy from configuration.
    pub fn from_config(config: Config) -> Self {
        let jwks_cache = Arc::new(JwksCache::with_ttl(
            Arc::new(config.clone()),
            config.jwks_cache_ttl,
            config.jwks_fetch_timeout,
        ));
        let policy = ValidationPolicy::from_config(&config);

        Self {
            authenticator: Arc::new(Authenticator::new(jwks_cache, policy)),
            config,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` - Public greeting
/// - `/health` - Liveness probe (simple "OK")
/// - `/metrics` - Prometheus metrics endpoint
/// - `/protected` - Echo of the caller's claims, requires authentication
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authenticator: Arc::clone(&state.authenticator),
    });

    let public_routes = Router::new()
        .route("/", get(handlers::public_root))
        .route("/health", get(handlers::health_check));

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/protected", get(handlers::protected))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}
