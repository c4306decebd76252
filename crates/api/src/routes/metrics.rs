//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics: engine counters and histograms in Prometheus text format.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
}

/// Registers help text for the metrics the engine emits.
pub fn describe() {
    metrics::describe_counter!(
        "inventory_mutations_total",
        "Committed stock mutations by transaction type"
    );
    metrics::describe_counter!(
        "inventory_conflict_retries_total",
        "Optimistic writes retried after a version conflict"
    );
    metrics::describe_counter!("allocations_created_total", "Allocations created");
    metrics::describe_counter!(
        "allocations_expired_total",
        "Pending allocations cancelled by the expiry sweeper"
    );
    metrics::describe_counter!("transfers_total", "Transfers by outcome");
    metrics::describe_histogram!(
        "transfer_duration_seconds",
        metrics::Unit::Seconds,
        "Time to complete or compensate a transfer"
    );
    metrics::describe_counter!("outbox_dispatched_total", "Notifications delivered");
    metrics::describe_counter!(
        "outbox_dispatch_failures_total",
        "Notification deliveries that failed and will be retried"
    );
    metrics::describe_counter!("reports_generated_total", "Reports generated by kind");
}
