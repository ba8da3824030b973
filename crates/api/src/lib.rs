//! HTTP API server for the CRM event-sourcing engine.
//!
//! Exposes command endpoints for organizations, contracts and service line
//! items, stream read-back, the event buffer and background jobs, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, create_default_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/tenants/{tenant}/organizations",
            post(routes::organizations::create::<S>),
        )
        .route(
            "/tenants/{tenant}/organizations/{id}",
            put(routes::organizations::update::<S>),
        )
        .route(
            "/tenants/{tenant}/organizations/{id}/domains",
            post(routes::organizations::link_domain::<S>),
        )
        .route(
            "/tenants/{tenant}/contracts",
            post(routes::contracts::create::<S>),
        )
        .route(
            "/tenants/{tenant}/contracts/{id}",
            put(routes::contracts::update::<S>).delete(routes::contracts::delete::<S>),
        )
        .route(
            "/tenants/{tenant}/service-line-items",
            post(routes::service_line_items::create::<S>),
        )
        .route(
            "/tenants/{tenant}/service-line-items/{id}",
            put(routes::service_line_items::update::<S>)
                .delete(routes::service_line_items::delete::<S>),
        )
        .route(
            "/tenants/{tenant}/service-line-items/{id}/close",
            post(routes::service_line_items::close::<S>),
        )
        .route(
            "/tenants/{tenant}/commands/{aggregate}/{kind}",
            post(routes::commands::dispatch::<S>),
        )
        .route(
            "/streams/{aggregate_id}/events",
            get(routes::events::list::<S>),
        )
        .route("/event-buffer", post(routes::event_buffer::park::<S>))
        .route(
            "/event-buffer/dispatch",
            post(routes::event_buffer::dispatch_expired::<S>),
        )
        .route(
            "/event-buffer/{uuid}/dispatch",
            post(routes::event_buffer::dispatch_one::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
