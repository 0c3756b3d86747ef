//! HTTP API server with observability for the inventory back end.
//!
//! Provides REST endpoints for catalog registration and order placement,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fulfillment::{CatalogService, OrderFulfillmentCore};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::{AuditLog, CatalogStore, CustomerStore, OrderStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// A backing store that implements every store contract.
pub trait Store: CatalogStore + CustomerStore + OrderStore + AuditLog + Clone + 'static {}

impl<T> Store for T where T: CatalogStore + CustomerStore + OrderStore + AuditLog + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub core: OrderFulfillmentCore<S, S, S, S>,
    pub catalog: CatalogService<S, S, S>,
}

impl<S: Store> AppState<S> {
    /// Wires the catalog service and the fulfillment core over one store.
    pub fn new(store: S) -> Self {
        Self {
            core: OrderFulfillmentCore::new(store.clone(), store.clone(), store.clone(), store.clone()),
            catalog: CatalogService::new(store.clone(), store.clone(), store),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/suppliers", post(routes::catalog::create_supplier::<S>))
        .route("/products", post(routes::catalog::create_product::<S>))
        .route("/products/{id}", get(routes::catalog::get_product::<S>))
        .route("/customers", post(routes::catalog::create_customer::<S>))
        .route("/orders", post(routes::orders::place::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/confirm", post(routes::orders::confirm::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/history", get(routes::orders::history::<S>))
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
