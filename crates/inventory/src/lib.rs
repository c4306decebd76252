//! Inventory allocation engine.
//!
//! Tracks on-hand and reserved quantities per SKU and warehouse, reserves
//! stock against orders and records every quantity change in the stock
//! ledger.
//!
//! # Components
//!
//! - [`WarehouseRegistry`]: warehouses, zones and bin locations
//! - [`InventoryItemStore`]: the per-item projection and its stock operations
//! - [`AllocationEngine`]: allocation lifecycle and expiry
//! - [`OutboxDispatcher`]: delivery of notifications written with each mutation
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use inventory::{InventoryConfig, InventoryItemStore, InMemoryInventoryRepository};
//!
//! let repo = Arc::new(InMemoryInventoryRepository::new());
//! let store = InventoryItemStore::new(repo, InventoryConfig::default());
//! ```

pub mod allocation;
pub mod config;
pub mod error;
pub mod item;
pub mod outbox;
pub mod repository;
pub mod warehouse;

pub use allocation::{
    Allocation, AllocationEngine, AllocationFilter, AllocationOutcome, AllocationStatus,
    AllocationSweeper, BulkAllocationResult, CreateAllocation, ExpirySummary, FailedAllocation,
    FulfillAllocation, FulfillmentOutcome, UpdateAllocation,
};
pub use config::InventoryConfig;
pub use error::{InventoryError, RepositoryError, Result};
pub use item::{
    AddStock, AdjustStock, AssignLocation, AttributeValue, CommitSale, InventoryItem,
    InventoryItemStore, ItemAttributes, ItemFilter, LocationQuantity, LossKind, NewItem,
    RecordCycleCount, RecordLoss, RecordReturn, StockChange, StockMovement, StockMutation,
};
pub use outbox::{
    DispatchSummary, InMemorySink, InventoryNotification, LoggingSink, NotificationSink,
    OutboxDispatcher, OutboxMessage, SinkError,
};
pub use repository::{
    InMemoryInventoryRepository, InventoryRepository, PostgresInventoryRepository, UnitOfWork,
};
pub use warehouse::{
    Address, Capacity, Location, LocationCapacity, NewWarehouse, RegisteredWarehouse, Warehouse,
    WarehouseRegistry, WarehouseType, Zone,
};
