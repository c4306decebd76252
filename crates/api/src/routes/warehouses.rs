//! Warehouse, zone and location endpoints.

use std::sync::Arc;

use axum::extract::State;
use common::{LocationId, WarehouseId, ZoneId};
use inventory::{
    Capacity, InventoryRepository, Location, LocationCapacity, NewWarehouse, RegisteredWarehouse,
    Warehouse, Zone,
};
use serde::{Deserialize, Serialize};

use crate::auth::{MANAGE, Principal};
use crate::extract::{ApiJson, ApiPath, ApiResult, Created, created, ok};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewZoneRequest {
    pub name: String,
    #[serde(default)]
    pub capacity: Capacity,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLocationRequest {
    pub code: String,
    #[serde(default)]
    pub capacity: Capacity,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarehouseDetail {
    pub warehouse: Warehouse,
    pub zones: Vec<Zone>,
    pub locations: Vec<Location>,
}

/// POST /warehouses: register a warehouse with its default zone and
/// receiving location.
#[tracing::instrument(skip(state, principal, request))]
pub async fn create<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiJson(request): ApiJson<NewWarehouse>,
) -> Created<RegisteredWarehouse> {
    principal.require(MANAGE)?;
    let registered = state.store.registry().register_warehouse(request).await?;
    created(registered)
}

/// GET /warehouses
#[tracing::instrument(skip(state, _principal))]
pub async fn list<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
) -> ApiResult<Vec<Warehouse>> {
    ok(state.store.registry().list_warehouses().await?)
}

/// GET /warehouses/{id}: warehouse with its zones and locations.
#[tracing::instrument(skip(state, _principal))]
pub async fn get<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<WarehouseId>,
) -> ApiResult<WarehouseDetail> {
    let registry = state.store.registry();
    let warehouse = registry.get_warehouse(id).await?;
    let zones = registry.list_zones(id).await?;
    let locations = registry.list_locations(id).await?;
    ok(WarehouseDetail {
        warehouse,
        zones,
        locations,
    })
}

/// PUT /warehouses/{id}/deactivate
#[tracing::instrument(skip(state, principal))]
pub async fn deactivate<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<WarehouseId>,
) -> ApiResult<Warehouse> {
    principal.require(MANAGE)?;
    ok(state.store.registry().deactivate_warehouse(id).await?)
}

/// POST /warehouses/{id}/zones
#[tracing::instrument(skip(state, principal, request))]
pub async fn add_zone<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<WarehouseId>,
    ApiJson(request): ApiJson<NewZoneRequest>,
) -> Created<Zone> {
    principal.require(MANAGE)?;
    let zone = state
        .store
        .registry()
        .add_zone(id, &request.name, request.capacity)
        .await?;
    created(zone)
}

/// POST /zones/{id}/locations
#[tracing::instrument(skip(state, principal, request))]
pub async fn add_location<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<ZoneId>,
    ApiJson(request): ApiJson<NewLocationRequest>,
) -> Created<Location> {
    principal.require(MANAGE)?;
    let location = state
        .store
        .registry()
        .add_location(id, &request.code, request.capacity)
        .await?;
    created(location)
}

/// GET /locations/{id}/capacity: occupancy against the item limit.
#[tracing::instrument(skip(state, _principal))]
pub async fn location_capacity<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<LocationId>,
) -> ApiResult<LocationCapacity> {
    ok(state.store.registry().location_capacity(id).await?)
}
