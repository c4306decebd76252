//! Inventory error types.

use common::{
    AllocationId, InventoryItemId, LocationId, OrderId, OrderItemId, Sku, WarehouseId, ZoneId,
};
use serde_json::json;
use stock_ledger::LedgerError;
use thiserror::Error;

use crate::allocation::AllocationStatus;

/// Errors raised by a repository implementation.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The item changed since it was read.
    #[error("Item {item_id} was modified concurrently (expected version {expected})")]
    ItemVersionConflict {
        item_id: InventoryItemId,
        expected: i64,
    },

    /// The allocation changed since it was read.
    #[error("Allocation {allocation_id} was modified concurrently (expected version {expected})")]
    AllocationVersionConflict {
        allocation_id: AllocationId,
        expected: i64,
    },

    /// An item already exists for this SKU in this warehouse.
    #[error("Item {sku} already exists in warehouse {warehouse_id}")]
    DuplicateItem { sku: Sku, warehouse_id: WarehouseId },

    /// A warehouse with this code already exists.
    #[error("Warehouse code already in use: {0}")]
    DuplicateWarehouseCode(String),

    /// A location with this code already exists in the warehouse.
    #[error("Location code already in use: {0}")]
    DuplicateLocationCode(String),

    /// The order line already holds a live allocation on this item.
    #[error(
        "Order item {order_item_id} of order {order_id} already holds an allocation on item {inventory_item_id}"
    )]
    DuplicateAllocation {
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
    },

    /// The write would put more units in a location than it holds.
    #[error(
        "Location {location_id} capacity exceeded: capacity {capacity}, occupied {occupied}, requested {requested}"
    )]
    LocationCapacityExceeded {
        location_id: LocationId,
        capacity: i64,
        occupied: i64,
        requested: i64,
    },

    /// A record the write depends on does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The ledger rejected the append.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RepositoryError {
    /// Returns true if retrying the operation against fresh state may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::ItemVersionConflict { .. }
                | RepositoryError::AllocationVersionConflict { .. }
                | RepositoryError::Ledger(LedgerError::SequenceConflict { .. })
        )
    }

    /// Returns true if the item row or its ledger moved on since it was read.
    pub fn is_item_conflict(&self) -> bool {
        matches!(
            self,
            RepositoryError::ItemVersionConflict { .. }
                | RepositoryError::Ledger(LedgerError::SequenceConflict { .. })
        )
    }
}

/// Errors returned by inventory operations.
///
/// Validation errors are raised before any state is read. State conflicts are
/// detected inside the atomic check, so no partial mutation is ever left
/// behind.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inventory item not found: {0}")]
    ItemNotFound(InventoryItemId),

    #[error("Inventory item {sku} not found in warehouse {warehouse_id}")]
    ItemNotStocked { sku: Sku, warehouse_id: WarehouseId },

    #[error("Warehouse not found: {0}")]
    WarehouseNotFound(String),

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("Location not found: {0}")]
    LocationNotFound(LocationId),

    #[error("Insufficient stock for item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: InventoryItemId,
        requested: i64,
        available: i64,
    },

    #[error(
        "Insufficient stock for item {item_id} at location {location_id}: requested {requested}, available {available}"
    )]
    InsufficientLocationStock {
        item_id: InventoryItemId,
        location_id: LocationId,
        requested: i64,
        available: i64,
    },

    #[error(
        "Insufficient reserved stock for item {item_id}: requested {requested}, reserved {reserved}"
    )]
    InsufficientReservedStock {
        item_id: InventoryItemId,
        requested: i64,
        reserved: i64,
    },

    #[error(
        "Location {location_id} capacity exceeded: capacity {capacity}, occupied {occupied}, requested {requested}"
    )]
    LocationCapacityExceeded {
        location_id: LocationId,
        capacity: i64,
        occupied: i64,
        requested: i64,
    },

    #[error("Allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    #[error(
        "Order item {order_item_id} of order {order_id} already holds an allocation on item {inventory_item_id}"
    )]
    DuplicateAllocation {
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
    },

    #[error("Cannot {action} allocation {allocation_id} in status {from}")]
    InvalidStatusTransition {
        allocation_id: AllocationId,
        from: AllocationStatus,
        action: &'static str,
    },

    #[error("Item {item_id} is still reserved ({reserved}) and cannot be deactivated")]
    ItemInUse {
        item_id: InventoryItemId,
        reserved: i64,
    },

    #[error("Item {sku} already exists in warehouse {warehouse_id}")]
    DuplicateItem { sku: Sku, warehouse_id: WarehouseId },

    #[error("Warehouse code already in use: {0}")]
    DuplicateWarehouseCode(String),

    #[error("Gave up on item {item_id} after {attempts} conflicting writes")]
    ConcurrencyExhausted {
        item_id: InventoryItemId,
        attempts: u32,
    },

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for InventoryError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::DuplicateItem { sku, warehouse_id } => {
                InventoryError::DuplicateItem { sku, warehouse_id }
            }
            RepositoryError::DuplicateWarehouseCode(code) => {
                InventoryError::DuplicateWarehouseCode(code)
            }
            RepositoryError::DuplicateAllocation {
                order_id,
                order_item_id,
                inventory_item_id,
            } => InventoryError::DuplicateAllocation {
                order_id,
                order_item_id,
                inventory_item_id,
            },
            RepositoryError::LocationCapacityExceeded {
                location_id,
                capacity,
                occupied,
                requested,
            } => InventoryError::LocationCapacityExceeded {
                location_id,
                capacity,
                occupied,
                requested,
            },
            RepositoryError::DuplicateLocationCode(code) => InventoryError::Validation(format!(
                "location code {code} is already in use in this warehouse"
            )),
            other => InventoryError::Repository(other),
        }
    }
}

impl From<LedgerError> for InventoryError {
    fn from(e: LedgerError) -> Self {
        InventoryError::Repository(RepositoryError::Ledger(e))
    }
}

impl InventoryError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Validation(_) => "VALIDATION_ERROR",
            InventoryError::ItemNotFound(_) | InventoryError::ItemNotStocked { .. } => {
                "INVENTORY_ITEM_NOT_FOUND"
            }
            InventoryError::WarehouseNotFound(_) => "WAREHOUSE_NOT_FOUND",
            InventoryError::ZoneNotFound(_) => "ZONE_NOT_FOUND",
            InventoryError::LocationNotFound(_) => "LOCATION_NOT_FOUND",
            InventoryError::InsufficientStock { .. }
            | InventoryError::InsufficientLocationStock { .. } => "INSUFFICIENT_STOCK",
            InventoryError::InsufficientReservedStock { .. } => "INSUFFICIENT_RESERVED_STOCK",
            InventoryError::LocationCapacityExceeded { .. } => "LOCATION_CAPACITY_EXCEEDED",
            InventoryError::AllocationNotFound(_) => "ALLOCATION_NOT_FOUND",
            InventoryError::DuplicateAllocation { .. } => "DUPLICATE_ALLOCATION",
            InventoryError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            InventoryError::ItemInUse { .. } => "INVENTORY_ITEM_IN_USE",
            InventoryError::DuplicateItem { .. } => "DUPLICATE_INVENTORY_ITEM",
            InventoryError::DuplicateWarehouseCode(_) => "DUPLICATE_WAREHOUSE_CODE",
            InventoryError::ConcurrencyExhausted { .. } => "CONCURRENCY_CONFLICT",
            InventoryError::Repository(_) => "INTERNAL_ERROR",
        }
    }

    /// Structured details for the error envelope.
    pub fn details(&self) -> serde_json::Value {
        match self {
            InventoryError::ItemNotFound(id) => json!({ "inventoryItemId": id }),
            InventoryError::ItemNotStocked { sku, warehouse_id } => {
                json!({ "sku": sku, "warehouseId": warehouse_id })
            }
            InventoryError::WarehouseNotFound(id) => json!({ "warehouseId": id }),
            InventoryError::ZoneNotFound(id) => json!({ "zoneId": id }),
            InventoryError::LocationNotFound(id) => json!({ "locationId": id }),
            InventoryError::InsufficientStock {
                item_id,
                requested,
                available,
            } => json!({
                "inventoryItemId": item_id,
                "requested": requested,
                "available": available,
            }),
            InventoryError::InsufficientLocationStock {
                item_id,
                location_id,
                requested,
                available,
            } => json!({
                "inventoryItemId": item_id,
                "locationId": location_id,
                "requested": requested,
                "available": available,
            }),
            InventoryError::InsufficientReservedStock {
                item_id,
                requested,
                reserved,
            } => json!({
                "inventoryItemId": item_id,
                "requested": requested,
                "reserved": reserved,
            }),
            InventoryError::LocationCapacityExceeded {
                location_id,
                capacity,
                occupied,
                requested,
            } => json!({
                "locationId": location_id,
                "capacity": capacity,
                "occupied": occupied,
                "requested": requested,
            }),
            InventoryError::AllocationNotFound(id) => json!({ "allocationId": id }),
            InventoryError::DuplicateAllocation {
                order_id,
                order_item_id,
                inventory_item_id,
            } => json!({
                "orderId": order_id,
                "orderItemId": order_item_id,
                "inventoryItemId": inventory_item_id,
            }),
            InventoryError::InvalidStatusTransition {
                allocation_id,
                from,
                action,
            } => json!({
                "allocationId": allocation_id,
                "currentStatus": from,
                "action": action,
            }),
            InventoryError::ItemInUse { item_id, reserved } => {
                json!({ "inventoryItemId": item_id, "reserved": reserved })
            }
            InventoryError::DuplicateItem { sku, warehouse_id } => {
                json!({ "sku": sku, "warehouseId": warehouse_id })
            }
            InventoryError::DuplicateWarehouseCode(code) => json!({ "code": code }),
            InventoryError::ConcurrencyExhausted { item_id, attempts } => {
                json!({ "inventoryItemId": item_id, "attempts": attempts })
            }
            InventoryError::Validation(_) | InventoryError::Repository(_) => json!({}),
        }
    }
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_reports_requested_and_available() {
        let item_id = InventoryItemId::new();
        let err = InventoryError::InsufficientStock {
            item_id,
            requested: 4,
            available: 3,
        };
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
        let details = err.details();
        assert_eq!(details["requested"], 4);
        assert_eq!(details["available"], 3);
        assert_eq!(details["inventoryItemId"], item_id.to_string());
    }

    #[test]
    fn transition_error_names_current_status() {
        let err = InventoryError::InvalidStatusTransition {
            allocation_id: AllocationId::new(),
            from: AllocationStatus::Cancelled,
            action: "fulfill",
        };
        assert_eq!(err.code(), "INVALID_STATUS_TRANSITION");
        assert_eq!(err.details()["currentStatus"], "CANCELLED");
        assert!(err.to_string().contains("fulfill"));
    }

    #[test]
    fn sequence_conflicts_are_retryable() {
        let err = RepositoryError::Ledger(LedgerError::SequenceConflict {
            item_id: InventoryItemId::new(),
            expected: stock_ledger::Sequence::new(1),
            actual: stock_ledger::Sequence::new(2),
        });
        assert!(err.is_conflict());
        assert!(!RepositoryError::DuplicateWarehouseCode("A".into()).is_conflict());
    }

    #[test]
    fn duplicate_rows_surface_as_domain_errors() {
        let err: InventoryError = RepositoryError::DuplicateWarehouseCode("WH-1".into()).into();
        assert_eq!(err.code(), "DUPLICATE_WAREHOUSE_CODE");

        let err: InventoryError = RepositoryError::DuplicateLocationCode("A-01".into()).into();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
