//! Shared identifier types used across the inventory crates.

pub mod types;

pub use types::{
    AllocationId, InventoryItemId, LocationId, MessageId, OrderId, OrderItemId, ProductId, Sku,
    TransactionId, WarehouseId, ZoneId,
};
