//! Allocation lifecycle endpoints.

use std::sync::Arc;

use axum::extract::State;
use common::{AllocationId, InventoryItemId, OrderId};
use inventory::{
    Allocation, AllocationFilter, AllocationOutcome, AllocationStatus, BulkAllocationResult,
    CreateAllocation, FulfillAllocation, FulfillmentOutcome, InventoryRepository,
    UpdateAllocation,
};
use serde::Deserialize;

use crate::auth::{ALLOCATE, Principal};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery, ApiResult, Created, created, ok};
use crate::state::AppState;

/// Upper bound on allocations per bulk request.
pub const MAX_BULK_ALLOCATIONS: usize = 100;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAllocationRequest {
    pub allocations: Vec<CreateAllocation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationListQuery {
    pub order_id: Option<OrderId>,
    pub inventory_item_id: Option<InventoryItemId>,
    pub status: Option<AllocationStatus>,
}

/// POST /allocations: reserve stock for an order item.
#[tracing::instrument(skip(state, principal, request))]
pub async fn create<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiJson(request): ApiJson<CreateAllocation>,
) -> Created<AllocationOutcome> {
    principal.require(ALLOCATE)?;
    created(state.allocations.create_allocation(request).await?)
}

/// POST /allocations/bulk: each request succeeds or fails on its own.
#[tracing::instrument(skip(state, principal, request), fields(count = request.allocations.len()))]
pub async fn create_bulk<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiJson(request): ApiJson<BulkAllocationRequest>,
) -> ApiResult<BulkAllocationResult> {
    principal.require(ALLOCATE)?;
    if request.allocations.is_empty() {
        return Err(ApiError::BadRequest(
            "allocations must not be empty".to_string(),
        ));
    }
    if request.allocations.len() > MAX_BULK_ALLOCATIONS {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_BULK_ALLOCATIONS} allocations per request"
        )));
    }
    ok(state.allocations.create_bulk(request.allocations).await)
}

/// GET /allocations
#[tracing::instrument(skip(state, _principal))]
pub async fn list<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<AllocationListQuery>,
) -> ApiResult<Vec<Allocation>> {
    let mut filter = AllocationFilter::new();
    if let Some(order_id) = query.order_id {
        filter = filter.order(order_id);
    }
    if let Some(item_id) = query.inventory_item_id {
        filter = filter.item(item_id);
    }
    if let Some(status) = query.status {
        filter = filter.status(status);
    }
    ok(state.allocations.list_allocations(&filter).await?)
}

/// GET /allocations/{id}
#[tracing::instrument(skip(state, _principal))]
pub async fn get<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<AllocationId>,
) -> ApiResult<Allocation> {
    ok(state.allocations.get_allocation(id).await?)
}

/// PUT /allocations/{id}: change quantity or item of a pending allocation.
#[tracing::instrument(skip(state, principal, request))]
pub async fn update<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<AllocationId>,
    ApiJson(request): ApiJson<UpdateAllocation>,
) -> ApiResult<AllocationOutcome> {
    principal.require(ALLOCATE)?;
    ok(state.allocations.update_allocation(id, request).await?)
}

/// PUT /allocations/{id}/confirm
#[tracing::instrument(skip(state, principal))]
pub async fn confirm<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<AllocationId>,
) -> ApiResult<Allocation> {
    principal.require(ALLOCATE)?;
    ok(state.allocations.confirm(id).await?)
}

/// PUT /allocations/{id}/cancel: releases the reservation.
#[tracing::instrument(skip(state, principal, request))]
pub async fn cancel<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<AllocationId>,
    ApiJson(request): ApiJson<CancelRequest>,
) -> ApiResult<AllocationOutcome> {
    principal.require(ALLOCATE)?;
    ok(state.allocations.cancel(id, &request.reason).await?)
}

/// PUT /allocations/{id}/fulfill: ships the reserved units (SALE).
#[tracing::instrument(skip(state, principal, request))]
pub async fn fulfill<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<AllocationId>,
    ApiJson(request): ApiJson<FulfillAllocation>,
) -> ApiResult<FulfillmentOutcome> {
    principal.require(ALLOCATE)?;
    ok(state.allocations.fulfill(id, request).await?)
}
