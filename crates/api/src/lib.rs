//! HTTP API server for the inventory allocation engine.
//!
//! Exposes warehouses, items, stock operations, transfers, allocations and
//! reports under `/inventory/v1`, with structured logging (tracing) and
//! Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use inventory::{InventoryConfig, InventoryRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Path prefix of every inventory route.
pub const API_PREFIX: &str = "/inventory/v1";

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R: InventoryRepository>(
    state: Arc<AppState<R>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    use routes::{allocations, items, reports, warehouses};

    let inventory = Router::new()
        .route(
            "/warehouses",
            post(warehouses::create::<R>).get(warehouses::list::<R>),
        )
        .route("/warehouses/{id}", get(warehouses::get::<R>))
        .route(
            "/warehouses/{id}/deactivate",
            put(warehouses::deactivate::<R>),
        )
        .route("/warehouses/{id}/zones", post(warehouses::add_zone::<R>))
        .route("/zones/{id}/locations", post(warehouses::add_location::<R>))
        .route(
            "/locations/{id}/capacity",
            get(warehouses::location_capacity::<R>),
        )
        .route(
            "/inventory-items",
            post(items::create::<R>).get(items::list::<R>),
        )
        .route("/inventory-items/{id}", get(items::get::<R>))
        .route("/inventory-items/{id}/add-stock", post(items::add_stock::<R>))
        .route(
            "/inventory-items/{id}/adjust-stock",
            post(items::adjust_stock::<R>),
        )
        .route("/inventory-items/{id}/transfer", post(items::transfer::<R>))
        .route(
            "/inventory-items/{id}/returns",
            post(items::record_return::<R>),
        )
        .route("/inventory-items/{id}/losses", post(items::record_loss::<R>))
        .route(
            "/inventory-items/{id}/cycle-counts",
            post(items::record_cycle_count::<R>),
        )
        .route(
            "/inventory-items/{id}/assign-location",
            post(items::assign_location::<R>),
        )
        .route(
            "/inventory-items/{id}/thresholds",
            put(items::update_thresholds::<R>),
        )
        .route(
            "/inventory-items/{id}/deactivate",
            put(items::deactivate::<R>),
        )
        .route(
            "/inventory-items/{id}/transactions",
            get(items::transactions::<R>),
        )
        .route("/inventory-items/{id}/reconcile", get(items::reconcile::<R>))
        .route("/inventory-items/{id}/history", get(items::history::<R>))
        .route(
            "/allocations",
            post(allocations::create::<R>).get(allocations::list::<R>),
        )
        .route("/allocations/bulk", post(allocations::create_bulk::<R>))
        .route(
            "/allocations/{id}",
            get(allocations::get::<R>).put(allocations::update::<R>),
        )
        .route("/allocations/{id}/confirm", put(allocations::confirm::<R>))
        .route("/allocations/{id}/cancel", put(allocations::cancel::<R>))
        .route("/allocations/{id}/fulfill", put(allocations::fulfill::<R>))
        .route("/reports/low-stock", get(reports::low_stock::<R>))
        .route("/reports/inventory-value", get(reports::inventory_value::<R>))
        .route("/reports/movements", get(reports::movements::<R>))
        .route("/reports/turnover", get(reports::turnover::<R>))
        .route("/reports/stockouts", get(reports::stockouts::<R>))
        .with_state(state);

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .nest(API_PREFIX, inventory)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over a repository.
pub fn create_state<R: InventoryRepository>(
    repo: Arc<R>,
    config: InventoryConfig,
) -> Arc<AppState<R>> {
    Arc::new(AppState::new(repo, config))
}
