//! HTTP gateway for the order placement system.
//!
//! Exposes user lookup and order placement to external clients, runs the
//! order placement saga through [`saga::OrderOrchestrator`], and serves
//! structured logs (tracing) and Prometheus metrics. The leaf services are
//! either reached over RPC or embedded in the gateway process.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// `/health` and `/metrics`, shared by the gateway and the leaf servers.
pub fn ops_router(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle)
}

/// Creates the gateway router with all routes and shared state.
pub fn create_app(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route(
            "/user/{userId}",
            get(routes::users::get).put(routes::users::update),
        )
        .route("/order", post(routes::orders::place))
        .route("/order/{orderId}", get(routes::orders::get))
        .route("/order/{orderId}/cancel", post(routes::orders::cancel))
        .route("/order/{orderId}/saga", get(routes::orders::saga_status))
        .with_state(state)
        .merge(ops_router(metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
