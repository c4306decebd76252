use chrono::{DateTime, Utc};
use common::{AllocationId, InventoryItemId, LocationId, OrderId, OrderItemId};
use serde::{Deserialize, Serialize};
use stock_ledger::{Reference, StockTransaction, TransactionType};

use super::{Allocation, AllocationFilter, AllocationStatus, EXPIRED_REASON};
use crate::error::{InventoryError, RepositoryError, Result};
use crate::item::{InventoryItem, InventoryItemStore, Plan, StockChange, release_change};
use crate::repository::{AllocationWrite, InventoryRepository, UnitOfWork};

/// Reference type under which an allocation's reservations are recorded.
pub const ALLOCATION_REFERENCE: &str = "ALLOCATION";

/// Reference type recorded on the SALE of a fulfilled allocation.
pub const SHIPMENT_REFERENCE: &str = "SHIPMENT";

fn allocation_reference(id: AllocationId) -> Reference {
    Reference::new(ALLOCATION_REFERENCE, id.to_string())
}

fn is_allocation_conflict(e: &InventoryError) -> bool {
    matches!(
        e,
        InventoryError::Repository(RepositoryError::AllocationVersionConflict { .. })
    )
}

/// Request to reserve stock against an order item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAllocation {
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub inventory_item_id: InventoryItemId,
    pub quantity: i64,
    /// Defaults to now plus the configured TTL.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateAllocation {
    pub fn new(
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
        quantity: i64,
    ) -> Self {
        Self {
            order_id,
            order_item_id,
            inventory_item_id,
            quantity,
            expires_at: None,
        }
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Shipment details recorded when an allocation is fulfilled.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillAllocation {
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub location_id: Option<LocationId>,
}

impl FulfillAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shipment(mut self, number: impl Into<String>) -> Self {
        self.reference_number = Some(number.into());
        self
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    fn reference(&self, allocation_id: AllocationId) -> Reference {
        Reference::new(
            self.reference_type
                .clone()
                .unwrap_or_else(|| SHIPMENT_REFERENCE.to_string()),
            self.reference_number
                .clone()
                .unwrap_or_else(|| allocation_id.to_string()),
        )
    }
}

/// Change to a pending allocation. Unset fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllocation {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub inventory_item_id: Option<InventoryItemId>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl UpdateAllocation {
    pub fn quantity(quantity: i64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Default::default()
        }
    }

    pub fn item(mut self, inventory_item_id: InventoryItemId) -> Self {
        self.inventory_item_id = Some(inventory_item_id);
        self
    }
}

/// An allocation after an operation, with a snapshot of the item it holds.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationOutcome {
    pub allocation: Allocation,
    pub inventory_item: InventoryItem,
    /// Transaction written by the operation; None when nothing moved.
    pub transaction: Option<StockTransaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentOutcome {
    pub allocation: Allocation,
    pub transaction: StockTransaction,
    pub inventory_item: InventoryItem,
}

/// Counts from one expiry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExpirySummary {
    pub expired: usize,
    /// Allocations another request transitioned first.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAllocation {
    /// Position of the request in the bulk input.
    pub index: usize,
    pub order_item_id: OrderItemId,
    pub inventory_item_id: InventoryItemId,
    pub code: &'static str,
    pub message: String,
}

/// Partial-success result of a bulk allocation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAllocationResult {
    pub successful_allocations: Vec<AllocationOutcome>,
    pub failed_allocations: Vec<FailedAllocation>,
}

/// Owns the allocation lifecycle.
///
/// Every transition that moves stock is committed in the same unit of work
/// as the allocation row, guarded by the allocation's version, so a status
/// change and its reservation movement never diverge.
pub struct AllocationEngine<R> {
    store: InventoryItemStore<R>,
}

impl<R> Clone for AllocationEngine<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<R: InventoryRepository> AllocationEngine<R> {
    pub fn new(store: InventoryItemStore<R>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InventoryItemStore<R> {
        &self.store
    }

    /// Reserves stock and records a PENDING allocation.
    ///
    /// Repeating a request for an order item that already holds a live
    /// allocation on the same inventory item returns that allocation.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, item_id = %request.inventory_item_id, quantity = request.quantity))]
    pub async fn create_allocation(&self, request: CreateAllocation) -> Result<AllocationOutcome> {
        if request.quantity <= 0 {
            return Err(InventoryError::Validation(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        if let Some(existing) = self.existing_allocation(&request).await? {
            return Ok(existing);
        }

        let item = self.store.get_item(request.inventory_item_id).await?;
        if !item.is_active {
            return Err(InventoryError::ItemNotFound(item.id));
        }

        let now = Utc::now();
        let allocation = Allocation {
            id: AllocationId::new(),
            order_id: request.order_id,
            order_item_id: request.order_item_id,
            inventory_item_id: item.id,
            warehouse_id: item.warehouse_id,
            quantity: request.quantity,
            status: AllocationStatus::Pending,
            expires_at: Some(
                request
                    .expires_at
                    .unwrap_or_else(|| now + self.store.config().allocation_ttl()),
            ),
            cancellation_reason: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let reference = allocation_reference(allocation.id);

        let result = self
            .store
            .mutate(item.id, None, |_| {
                Ok(Plan::change(
                    StockChange::new(TransactionType::Reservation, allocation.quantity)
                        .reference(Some(reference.clone())),
                )
                .with_allocation(AllocationWrite::Insert(allocation.clone())))
            })
            .await;
        let committed = match result {
            Ok(committed) => committed,
            // An identical request committed first; nothing was reserved here.
            Err(e @ InventoryError::DuplicateAllocation { .. }) => {
                return match self.existing_allocation(&request).await? {
                    Some(existing) => Ok(existing),
                    None => Err(e),
                };
            }
            Err(e) => return Err(e),
        };

        metrics::counter!("allocations_created_total").increment(1);
        tracing::info!(allocation_id = %allocation.id, "allocation created");

        Ok(AllocationOutcome {
            allocation,
            inventory_item: committed.item,
            transaction: committed.transactions.into_iter().last(),
        })
    }

    /// The live allocation already held by the request's order line, if any.
    async fn existing_allocation(
        &self,
        request: &CreateAllocation,
    ) -> Result<Option<AllocationOutcome>> {
        let existing = self
            .store
            .repository()
            .find_allocation(
                request.order_id,
                request.order_item_id,
                request.inventory_item_id,
            )
            .await?;
        let Some(existing) = existing else {
            return Ok(None);
        };
        tracing::info!(allocation_id = %existing.id, "allocation already exists");
        let inventory_item = self.store.get_item(existing.inventory_item_id).await?;
        Ok(Some(AllocationOutcome {
            allocation: existing,
            inventory_item,
            transaction: None,
        }))
    }

    /// Attempts each request independently and reports which succeeded.
    #[tracing::instrument(skip(self, requests), fields(count = requests.len()))]
    pub async fn create_bulk(&self, requests: Vec<CreateAllocation>) -> BulkAllocationResult {
        let mut result = BulkAllocationResult::default();
        for (index, request) in requests.into_iter().enumerate() {
            let order_item_id = request.order_item_id;
            let inventory_item_id = request.inventory_item_id;
            match self.create_allocation(request).await {
                Ok(outcome) => result.successful_allocations.push(outcome),
                Err(e) => result.failed_allocations.push(FailedAllocation {
                    index,
                    order_item_id,
                    inventory_item_id,
                    code: e.code(),
                    message: e.to_string(),
                }),
            }
        }
        result
    }

    pub async fn get_allocation(&self, id: AllocationId) -> Result<Allocation> {
        self.store
            .repository()
            .get_allocation(id)
            .await?
            .ok_or(InventoryError::AllocationNotFound(id))
    }

    pub async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>> {
        Ok(self.store.repository().list_allocations(filter).await?)
    }

    /// PENDING → CONFIRMED. The reservation stops expiring.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, id: AllocationId) -> Result<Allocation> {
        let attempts = self.store.config().max_conflict_retries;
        for _ in 0..attempts {
            let allocation = self.get_allocation(id).await?;
            let next = allocation.confirm(Utc::now())?;
            let result = self
                .store
                .repository()
                .commit(UnitOfWork::new().allocation(Some(
                    AllocationWrite::Update {
                        allocation: next.clone(),
                        expected_version: allocation.version,
                    },
                )))
                .await;
            match result {
                Ok(()) => {
                    tracing::info!(allocation_id = %id, "allocation confirmed");
                    return Ok(next);
                }
                Err(RepositoryError::AllocationVersionConflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let allocation = self.get_allocation(id).await?;
        Err(InventoryError::ConcurrencyExhausted {
            item_id: allocation.inventory_item_id,
            attempts,
        })
    }

    /// PENDING | CONFIRMED → FULFILLED, consuming the reservation with a SALE.
    #[tracing::instrument(skip(self, request))]
    pub async fn fulfill(
        &self,
        id: AllocationId,
        request: FulfillAllocation,
    ) -> Result<FulfillmentOutcome> {
        let attempts = self.store.config().max_conflict_retries;
        for _ in 0..attempts {
            let allocation = self.get_allocation(id).await?;
            match self.try_fulfill(&allocation, &request).await {
                Err(e) if is_allocation_conflict(&e) => continue,
                other => return other,
            }
        }
        let allocation = self.get_allocation(id).await?;
        Err(InventoryError::ConcurrencyExhausted {
            item_id: allocation.inventory_item_id,
            attempts,
        })
    }

    async fn try_fulfill(
        &self,
        allocation: &Allocation,
        request: &FulfillAllocation,
    ) -> Result<FulfillmentOutcome> {
        let next = allocation.fulfill(Utc::now())?;
        if let Some(location_id) = request.location_id {
            self.store
                .registry()
                .location_in(allocation.warehouse_id, location_id)
                .await?;
        }
        let reference = request.reference(allocation.id);

        let committed = self
            .store
            .mutate(allocation.inventory_item_id, None, |_| {
                Ok(Plan::change(
                    StockChange::new(TransactionType::Sale, -allocation.quantity)
                        .at(request.location_id)
                        .reference(Some(reference.clone())),
                )
                .with_allocation(AllocationWrite::Update {
                    allocation: next.clone(),
                    expected_version: allocation.version,
                }))
            })
            .await?;

        let transaction = committed.transactions.into_iter().last().ok_or_else(|| {
            InventoryError::Validation("fulfillment recorded no transaction".to_string())
        })?;
        tracing::info!(allocation_id = %allocation.id, transaction_id = %transaction.id, "allocation fulfilled");

        Ok(FulfillmentOutcome {
            allocation: next,
            transaction,
            inventory_item: committed.item,
        })
    }

    /// PENDING | CONFIRMED → CANCELLED, releasing the reservation.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel(&self, id: AllocationId, reason: &str) -> Result<AllocationOutcome> {
        if reason.trim().is_empty() {
            return Err(InventoryError::Validation("reason is required".to_string()));
        }
        let attempts = self.store.config().max_conflict_retries;
        for _ in 0..attempts {
            let allocation = self.get_allocation(id).await?;
            match self.try_cancel(&allocation, reason.trim()).await {
                Err(e) if is_allocation_conflict(&e) => continue,
                other => return other,
            }
        }
        let allocation = self.get_allocation(id).await?;
        Err(InventoryError::ConcurrencyExhausted {
            item_id: allocation.inventory_item_id,
            attempts,
        })
    }

    async fn try_cancel(&self, allocation: &Allocation, reason: &str) -> Result<AllocationOutcome> {
        let next = allocation.cancel(reason, Utc::now())?;
        let reference = allocation_reference(allocation.id);

        let committed = self
            .store
            .mutate(allocation.inventory_item_id, None, |item| {
                let plan = match release_change(item, allocation.quantity, Some(reference.clone())) {
                    Some(change) => Plan::change(change),
                    None => Plan::default(),
                };
                Ok(plan.with_allocation(AllocationWrite::Update {
                    allocation: next.clone(),
                    expected_version: allocation.version,
                }))
            })
            .await?;

        tracing::info!(allocation_id = %allocation.id, reason, "allocation cancelled");
        Ok(AllocationOutcome {
            allocation: next,
            inventory_item: committed.item,
            transaction: committed.transactions.into_iter().last(),
        })
    }

    /// Cancels pending allocations whose expiry has passed.
    ///
    /// An allocation confirmed, fulfilled or cancelled by a concurrent request
    /// is skipped, not reported as a failure.
    #[tracing::instrument(skip(self))]
    pub async fn expire_due(&self, now: DateTime<Utc>, limit: usize) -> Result<ExpirySummary> {
        let due = self
            .store
            .repository()
            .due_allocations(now, limit)
            .await?;

        let mut summary = ExpirySummary::default();
        for candidate in due {
            // Re-read: the candidate list may already be stale.
            let current = match self.store.repository().get_allocation(candidate.id).await {
                Ok(Some(current)) if current.is_due(now) => current,
                Ok(_) => {
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(allocation_id = %candidate.id, error = %e, "could not load allocation for expiry");
                    summary.failed += 1;
                    continue;
                }
            };

            match self.try_cancel(&current, EXPIRED_REASON).await {
                Ok(_) => {
                    metrics::counter!("allocations_expired_total").increment(1);
                    summary.expired += 1;
                }
                Err(e)
                    if is_allocation_conflict(&e)
                        || matches!(e, InventoryError::InvalidStatusTransition { .. }) =>
                {
                    tracing::debug!(allocation_id = %current.id, "allocation changed concurrently, skipping expiry");
                    summary.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!(allocation_id = %current.id, error = %e, "failed to expire allocation");
                    summary.failed += 1;
                }
            }
        }

        if summary.expired > 0 || summary.failed > 0 {
            tracing::info!(
                expired = summary.expired,
                skipped = summary.skipped,
                failed = summary.failed,
                "expiry pass finished"
            );
        }
        Ok(summary)
    }

    /// Changes the quantity or inventory item of a PENDING allocation.
    ///
    /// On the same item the old reservation is released and the new one taken
    /// in one unit of work. Across items the new item is reserved first and
    /// the old released second; if the second step fails the new reservation
    /// is released again, so the original reservation always survives a
    /// failed update.
    #[tracing::instrument(skip(self, request))]
    pub async fn update_allocation(
        &self,
        id: AllocationId,
        request: UpdateAllocation,
    ) -> Result<AllocationOutcome> {
        if let Some(quantity) = request.quantity
            && quantity <= 0
        {
            return Err(InventoryError::Validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        let attempts = self.store.config().max_conflict_retries;
        for _ in 0..attempts {
            let allocation = self.get_allocation(id).await?;
            let result = match request.inventory_item_id {
                Some(item_id) if item_id != allocation.inventory_item_id => {
                    self.move_allocation(&allocation, item_id, &request).await
                }
                _ => self.resize_allocation(&allocation, &request).await,
            };
            match result {
                Err(e) if is_allocation_conflict(&e) => continue,
                other => return other,
            }
        }
        let allocation = self.get_allocation(id).await?;
        Err(InventoryError::ConcurrencyExhausted {
            item_id: allocation.inventory_item_id,
            attempts,
        })
    }

    async fn resize_allocation(
        &self,
        allocation: &Allocation,
        request: &UpdateAllocation,
    ) -> Result<AllocationOutcome> {
        let quantity = request.quantity.unwrap_or(allocation.quantity);
        let next = allocation.update(
            quantity,
            allocation.inventory_item_id,
            allocation.warehouse_id,
            request.expires_at,
            Utc::now(),
        )?;
        let reference = allocation_reference(allocation.id);

        let committed = self
            .store
            .mutate(allocation.inventory_item_id, None, |item| {
                let mut changes = Vec::new();
                if quantity != allocation.quantity {
                    changes.extend(release_change(
                        item,
                        allocation.quantity,
                        Some(reference.clone()),
                    ));
                    changes.push(
                        StockChange::new(TransactionType::Reservation, quantity)
                            .reference(Some(reference.clone())),
                    );
                }
                Ok(Plan {
                    changes,
                    allocation: Some(AllocationWrite::Update {
                        allocation: next.clone(),
                        expected_version: allocation.version,
                    }),
                })
            })
            .await?;

        tracing::info!(allocation_id = %allocation.id, from = allocation.quantity, to = quantity, "allocation updated");
        Ok(AllocationOutcome {
            allocation: next,
            inventory_item: committed.item,
            transaction: committed.transactions.into_iter().last(),
        })
    }

    async fn move_allocation(
        &self,
        allocation: &Allocation,
        target_id: InventoryItemId,
        request: &UpdateAllocation,
    ) -> Result<AllocationOutcome> {
        let quantity = request.quantity.unwrap_or(allocation.quantity);
        let target = self.store.get_item(target_id).await?;
        if !target.is_active {
            return Err(InventoryError::ItemNotFound(target_id));
        }
        let next = allocation.update(
            quantity,
            target.id,
            target.warehouse_id,
            request.expires_at,
            Utc::now(),
        )?;
        let reference = allocation_reference(allocation.id);

        let reserved = self
            .store
            .mutate(target.id, None, |_| {
                Ok(Plan::change(
                    StockChange::new(TransactionType::Reservation, quantity)
                        .reference(Some(reference.clone())),
                ))
            })
            .await?;

        let released = self
            .store
            .mutate(allocation.inventory_item_id, None, |item| {
                let plan = match release_change(item, allocation.quantity, Some(reference.clone())) {
                    Some(change) => Plan::change(change),
                    None => Plan::default(),
                };
                Ok(plan.with_allocation(AllocationWrite::Update {
                    allocation: next.clone(),
                    expected_version: allocation.version,
                }))
            })
            .await;

        if let Err(e) = released {
            tracing::warn!(
                allocation_id = %allocation.id,
                item_id = %target.id,
                error = %e,
                "allocation move failed, releasing new reservation"
            );
            let undo = self
                .store
                .mutate(target.id, None, |item| {
                    Ok(release_change(item, quantity, Some(reference.clone()))
                        .map(Plan::change)
                        .unwrap_or_default())
                })
                .await;
            if let Err(undo) = undo {
                tracing::error!(
                    allocation_id = %allocation.id,
                    item_id = %target.id,
                    quantity,
                    error = %undo,
                    "failed to release reservation after failed allocation move"
                );
            }
            return Err(e);
        }

        tracing::info!(allocation_id = %allocation.id, from_item = %allocation.inventory_item_id, to_item = %target.id, "allocation moved");
        Ok(AllocationOutcome {
            allocation: next,
            inventory_item: reserved.item,
            transaction: reserved.transactions.into_iter().last(),
        })
    }
}
