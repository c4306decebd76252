//! Read-only report endpoints.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use common::InventoryItemId;
use inventory::InventoryRepository;
use reporting::{
    InventoryValueReport, LowStockQuery, LowStockReport, MovementQuery, MovementSeries,
    StockoutReport, TurnoverQuery, TurnoverReport, ValueQuery,
};
use serde::Deserialize;

use crate::auth::Principal;
use crate::extract::{ApiQuery, ApiResult, ok};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockoutQuery {
    pub inventory_item_id: InventoryItemId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// GET /reports/low-stock
#[tracing::instrument(skip(state, _principal))]
pub async fn low_stock<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<LowStockQuery>,
) -> ApiResult<LowStockReport> {
    ok(state.reports.low_stock(&query).await?)
}

/// GET /reports/inventory-value
#[tracing::instrument(skip(state, _principal))]
pub async fn inventory_value<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<ValueQuery>,
) -> ApiResult<InventoryValueReport> {
    ok(state.reports.inventory_value(&query).await?)
}

/// GET /reports/movements
#[tracing::instrument(skip(state, _principal))]
pub async fn movements<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<MovementQuery>,
) -> ApiResult<MovementSeries> {
    ok(state.reports.stock_movements(&query).await?)
}

/// GET /reports/turnover
#[tracing::instrument(skip(state, _principal))]
pub async fn turnover<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<TurnoverQuery>,
) -> ApiResult<TurnoverReport> {
    ok(state.reports.turnover(&query).await?)
}

/// GET /reports/stockouts
#[tracing::instrument(skip(state, _principal))]
pub async fn stockouts<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<StockoutQuery>,
) -> ApiResult<StockoutReport> {
    let report = state
        .reports
        .stockouts(query.inventory_item_id, query.from, query.to)
        .await?;
    ok(report)
}
