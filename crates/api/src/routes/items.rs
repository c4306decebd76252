//! Inventory item and stock operation endpoints.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use common::{InventoryItemId, LocationId, Sku, WarehouseId};
use inventory::{
    AddStock, AdjustStock, AssignLocation, InventoryItem, InventoryRepository, ItemFilter,
    LossKind, NewItem, RecordCycleCount, RecordLoss, RecordReturn, StockMutation,
};
use reporting::ItemHistory;
use serde::{Deserialize, Serialize};
use stock_ledger::{Reconciliation, StockTransaction, TransactionQuery, TransactionType};
use transfer::{TransferOutcome, TransferRequest};

use super::reference;
use crate::auth::{MANAGE, Principal};
use crate::extract::{ApiJson, ApiPath, ApiQuery, ApiResult, Created, created, ok};
use crate::state::AppState;

/// Reference type recorded when a receipt names only a reference number.
const RECEIPT_REFERENCE: &str = "PURCHASE_ORDER";
/// Reference type recorded for other manual operations.
const MANUAL_REFERENCE: &str = "MANUAL";

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub sku: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustStockRequest {
    pub quantity: i64,
    #[serde(default)]
    pub reason: String,
    pub location_id: Option<LocationId>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reason: Option<String>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LossRequest {
    pub kind: LossKind,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleCountRequest {
    pub counted_quantity: i64,
    pub location_id: Option<LocationId>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLocationRequest {
    pub from_location_id: LocationId,
    pub to_location_id: LocationId,
    pub quantity: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdsRequest {
    pub reorder_threshold: i64,
    pub target_stock_level: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

// -- Response types --

/// Outcome of a single stock operation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockOperationResponse {
    pub transaction: StockTransaction,
    pub inventory_item: InventoryItem,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    /// True when a retried request returned the original transaction.
    pub replayed: bool,
}

impl From<StockMutation> for StockOperationResponse {
    fn from(mutation: StockMutation) -> Self {
        Self {
            previous_quantity: mutation.previous_quantity(),
            new_quantity: mutation.new_quantity(),
            replayed: mutation.replayed,
            transaction: mutation.transaction,
            inventory_item: mutation.item,
        }
    }
}

// -- Handlers --

/// POST /inventory-items: start stocking a SKU in a warehouse.
#[tracing::instrument(skip(state, principal, request))]
pub async fn create<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiJson(request): ApiJson<NewItem>,
) -> Created<InventoryItem> {
    principal.require(MANAGE)?;
    created(state.store.create_item(request).await?)
}

/// GET /inventory-items
#[tracing::instrument(skip(state, _principal))]
pub async fn list<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiQuery(query): ApiQuery<ItemListQuery>,
) -> ApiResult<Vec<InventoryItem>> {
    let mut filter = ItemFilter::new();
    if let Some(warehouse_id) = query.warehouse_id {
        filter = filter.warehouse(warehouse_id);
    }
    if let Some(sku) = query.sku {
        filter = filter.sku(Sku::from(sku));
    }
    if let Some(category) = query.category {
        filter = filter.category(category);
    }
    if query.include_inactive {
        filter = filter.include_inactive();
    }
    ok(state.store.list_items(&filter).await?)
}

/// GET /inventory-items/{id}
#[tracing::instrument(skip(state, _principal))]
pub async fn get<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult<InventoryItem> {
    ok(state.store.get_item(id).await?)
}

/// POST /inventory-items/{id}/add-stock: receive stock (RECEIPT).
#[tracing::instrument(skip(state, principal, request))]
pub async fn add_stock<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<AddStockRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let mut command = AddStock::new(request.quantity).by(principal.id);
    if let Some(location_id) = request.location_id {
        command = command.at(location_id);
    }
    if let Some(reference) = reference(
        request.reference_type,
        request.reference_number,
        RECEIPT_REFERENCE,
    )? {
        command = command.reference(reference);
    }
    ok(state.store.add_stock(id, command).await?.into())
}

/// POST /inventory-items/{id}/adjust-stock: signed correction (ADJUSTMENT).
#[tracing::instrument(skip(state, principal, request))]
pub async fn adjust_stock<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<AdjustStockRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let mut command = AdjustStock::new(request.quantity, request.reason).by(principal.id);
    if let Some(location_id) = request.location_id {
        command = command.at(location_id);
    }
    if let Some(reference) = reference(
        request.reference_type,
        request.reference_number,
        MANUAL_REFERENCE,
    )? {
        command = command.reference(reference);
    }
    ok(state.store.adjust_stock(id, command).await?.into())
}

/// POST /inventory-items/{id}/transfer: move stock to another warehouse.
///
/// A compensated transfer is reported as an error with code
/// `TRANSFER_COMPENSATED`, never as a success.
#[tracing::instrument(skip(state, principal, request))]
pub async fn transfer<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<TransferRequest>,
) -> ApiResult<TransferOutcome> {
    principal.require(MANAGE)?;
    let request = request.by(principal.id);
    ok(state.transfers.transfer(id, request).await?)
}

/// POST /inventory-items/{id}/returns: take returned goods back (RETURN).
#[tracing::instrument(skip(state, principal, request))]
pub async fn record_return<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<ReturnRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let mut command = RecordReturn::new(request.quantity).by(principal.id);
    if let Some(location_id) = request.location_id {
        command = command.at(location_id);
    }
    if let Some(reason) = request.reason {
        command = command.reason(reason);
    }
    if let Some(reference) = reference(
        request.reference_type,
        request.reference_number,
        MANUAL_REFERENCE,
    )? {
        command = command.reference(reference);
    }
    ok(state.store.record_return(id, command).await?.into())
}

/// POST /inventory-items/{id}/losses: write off damaged or expired stock.
#[tracing::instrument(skip(state, principal, request))]
pub async fn record_loss<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<LossRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let mut command = RecordLoss::new(request.kind, request.quantity).by(principal.id);
    if let Some(location_id) = request.location_id {
        command = command.at(location_id);
    }
    if let Some(reason) = request.reason {
        command = command.reason(reason);
    }
    ok(state.store.record_loss(id, command).await?.into())
}

/// POST /inventory-items/{id}/cycle-counts: record a physical count.
#[tracing::instrument(skip(state, principal, request))]
pub async fn record_cycle_count<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<CycleCountRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let mut command = RecordCycleCount::new(request.counted_quantity).by(principal.id);
    if let Some(location_id) = request.location_id {
        command = command.at(location_id);
    }
    if let Some(reference) = reference(
        request.reference_type,
        request.reference_number,
        MANUAL_REFERENCE,
    )? {
        command = command.reference(reference);
    }
    ok(state.store.record_cycle_count(id, command).await?.into())
}

/// POST /inventory-items/{id}/assign-location: move units between bins.
#[tracing::instrument(skip(state, principal, request))]
pub async fn assign_location<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<AssignLocationRequest>,
) -> ApiResult<StockOperationResponse> {
    principal.require(MANAGE)?;
    let command = AssignLocation::new(
        request.from_location_id,
        request.to_location_id,
        request.quantity,
    )
    .by(principal.id);
    ok(state.store.assign_location(id, command).await?.into())
}

/// PUT /inventory-items/{id}/thresholds
#[tracing::instrument(skip(state, principal, request))]
pub async fn update_thresholds<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiJson(request): ApiJson<ThresholdsRequest>,
) -> ApiResult<InventoryItem> {
    principal.require(MANAGE)?;
    let item = state
        .store
        .update_thresholds(id, request.reorder_threshold, request.target_stock_level)
        .await?;
    ok(item)
}

/// PUT /inventory-items/{id}/deactivate: refused while stock is reserved.
#[tracing::instrument(skip(state, principal))]
pub async fn deactivate<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult<InventoryItem> {
    principal.require(MANAGE)?;
    ok(state.store.deactivate_item(id).await?)
}

/// GET /inventory-items/{id}/transactions: the item's ledger, oldest first.
#[tracing::instrument(skip(state, _principal))]
pub async fn transactions<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
    ApiQuery(query): ApiQuery<TransactionListQuery>,
) -> ApiResult<Vec<StockTransaction>> {
    // The item must exist even if its ledger is empty.
    state.store.get_item(id).await?;

    let mut ledger_query = TransactionQuery::for_item(id);
    if let Some(transaction_type) = query.transaction_type {
        ledger_query = ledger_query.transaction_type(transaction_type);
    }
    if let Some(from) = query.from {
        ledger_query = ledger_query.since(from);
    }
    if let Some(to) = query.to {
        ledger_query = ledger_query.until(to);
    }
    if let Some(limit) = query.limit {
        ledger_query = ledger_query.limit(limit);
    }
    if let Some(offset) = query.offset {
        ledger_query = ledger_query.offset(offset);
    }
    ok(state.store.transactions(ledger_query).await?)
}

/// GET /inventory-items/{id}/reconcile: replay the ledger against the item.
#[tracing::instrument(skip(state, _principal))]
pub async fn reconcile<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult<Reconciliation> {
    ok(state.store.reconcile(id).await?)
}

/// GET /inventory-items/{id}/history: quantities after every transaction.
#[tracing::instrument(skip(state, _principal))]
pub async fn history<R: InventoryRepository>(
    State(state): State<Arc<AppState<R>>>,
    _principal: Principal,
    ApiPath(id): ApiPath<InventoryItemId>,
) -> ApiResult<ItemHistory> {
    ok(state.reports.item_history(id).await?)
}
