//! Allocations: reservations of stock held against order items.

mod engine;
mod state;
mod sweeper;

pub use engine::{
    ALLOCATION_REFERENCE, AllocationEngine, AllocationOutcome, BulkAllocationResult,
    CreateAllocation, ExpirySummary, FailedAllocation, FulfillAllocation, FulfillmentOutcome,
    SHIPMENT_REFERENCE, UpdateAllocation,
};
pub use state::AllocationStatus;
pub use sweeper::AllocationSweeper;

use chrono::{DateTime, Utc};
use common::{AllocationId, InventoryItemId, OrderId, OrderItemId, WarehouseId};
use serde::{Deserialize, Serialize};

use crate::error::InventoryError;

/// Reason recorded when the sweeper cancels a lapsed allocation.
pub const EXPIRED_REASON: &str = "EXPIRED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: AllocationId,
    pub order_id: OrderId,
    pub order_item_id: OrderItemId,
    pub inventory_item_id: InventoryItemId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub status: AllocationStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Optimistic concurrency token; bumped by every write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Allocation {
    /// Returns true if a pending allocation has passed its expiry.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == AllocationStatus::Pending && self.expires_at.is_some_and(|at| at <= now)
    }

    fn transition(
        &self,
        allowed: bool,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> Result<Allocation, InventoryError> {
        if !allowed {
            return Err(InventoryError::InvalidStatusTransition {
                allocation_id: self.id,
                from: self.status,
                action,
            });
        }
        let mut next = self.clone();
        next.version += 1;
        next.updated_at = now;
        Ok(next)
    }

    /// PENDING → CONFIRMED; the reservation stops expiring.
    pub fn confirm(&self, now: DateTime<Utc>) -> Result<Allocation, InventoryError> {
        let mut next = self.transition(self.status.can_confirm(), "confirm", now)?;
        next.status = AllocationStatus::Confirmed;
        next.expires_at = None;
        Ok(next)
    }

    /// PENDING | CONFIRMED → FULFILLED.
    pub fn fulfill(&self, now: DateTime<Utc>) -> Result<Allocation, InventoryError> {
        let mut next = self.transition(self.status.can_fulfill(), "fulfill", now)?;
        next.status = AllocationStatus::Fulfilled;
        next.expires_at = None;
        Ok(next)
    }

    /// PENDING | CONFIRMED → CANCELLED.
    pub fn cancel(
        &self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Allocation, InventoryError> {
        let mut next = self.transition(self.status.can_cancel(), "cancel", now)?;
        next.status = AllocationStatus::Cancelled;
        next.expires_at = None;
        next.cancellation_reason = Some(reason.into());
        Ok(next)
    }

    /// Changes quantity or target item of a pending allocation.
    pub fn update(
        &self,
        quantity: i64,
        inventory_item_id: InventoryItemId,
        warehouse_id: WarehouseId,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Allocation, InventoryError> {
        let mut next = self.transition(self.status.can_update(), "update", now)?;
        next.quantity = quantity;
        next.inventory_item_id = inventory_item_id;
        next.warehouse_id = warehouse_id;
        if expires_at.is_some() {
            next.expires_at = expires_at;
        }
        Ok(next)
    }
}

/// Filter for listing allocations.
#[derive(Debug, Clone, Default)]
pub struct AllocationFilter {
    pub order_id: Option<OrderId>,
    pub inventory_item_id: Option<InventoryItemId>,
    pub status: Option<AllocationStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AllocationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn item(mut self, inventory_item_id: InventoryItemId) -> Self {
        self.inventory_item_id = Some(inventory_item_id);
        self
    }

    pub fn status(mut self, status: AllocationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn matches(&self, allocation: &Allocation) -> bool {
        if let Some(id) = self.order_id
            && allocation.order_id != id
        {
            return false;
        }
        if let Some(id) = self.inventory_item_id
            && allocation.inventory_item_id != id
        {
            return false;
        }
        if let Some(status) = self.status
            && allocation.status != status
        {
            return false;
        }
        true
    }
}
