//! Persistence for warehouses, items, allocations and the outbox.
//!
//! Every quantity change goes through [`InventoryRepository::commit`], which
//! applies a [`UnitOfWork`] atomically: the item row (compare-and-swap on its
//! version), its ledger transactions, an optional allocation row and any
//! outbox messages.

mod memory;
mod postgres;

pub use memory::InMemoryInventoryRepository;
pub use postgres::PostgresInventoryRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AllocationId, InventoryItemId, LocationId, MessageId, OrderId, OrderItemId, Sku, WarehouseId,
    ZoneId,
};
use stock_ledger::{StockLedger, StockTransaction};

use crate::allocation::{Allocation, AllocationFilter};
use crate::error::RepositoryError;
use crate::item::{InventoryItem, ItemFilter};
use crate::outbox::OutboxMessage;
use crate::warehouse::{Location, Warehouse, Zone};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Write of an item row and the ledger entries that explain it.
#[derive(Debug, Clone)]
pub struct ItemWrite {
    /// New state of the item.
    pub item: InventoryItem,
    /// Version the write was based on; None inserts a new item.
    pub expected_version: Option<i64>,
    /// Ledger entries, in sequence order, following the item's previous
    /// ledger sequence.
    pub transactions: Vec<StockTransaction>,
}

/// Write of an allocation row.
#[derive(Debug, Clone)]
pub enum AllocationWrite {
    Insert(Allocation),
    Update {
        allocation: Allocation,
        expected_version: i64,
    },
}

impl AllocationWrite {
    pub fn allocation(&self) -> &Allocation {
        match self {
            AllocationWrite::Insert(allocation) => allocation,
            AllocationWrite::Update { allocation, .. } => allocation,
        }
    }
}

/// Everything one logical operation writes, applied all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    pub item: Option<ItemWrite>,
    pub allocation: Option<AllocationWrite>,
    pub outbox: Vec<OutboxMessage>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn item(mut self, write: ItemWrite) -> Self {
        self.item = Some(write);
        self
    }

    pub fn allocation(mut self, write: Option<AllocationWrite>) -> Self {
        self.allocation = write;
        self
    }

    pub fn outbox(mut self, messages: Vec<OutboxMessage>) -> Self {
        self.outbox = messages;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.item.is_none() && self.allocation.is_none() && self.outbox.is_empty()
    }
}

/// Storage for the inventory engine.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryRepository: Send + Sync + 'static {
    /// The ledger this repository appends to inside `commit`.
    type Ledger: StockLedger;

    fn ledger(&self) -> &Self::Ledger;

    // Warehouses

    /// Inserts a warehouse with its initial zones and locations.
    async fn insert_warehouse(
        &self,
        warehouse: &Warehouse,
        zones: &[Zone],
        locations: &[Location],
    ) -> Result<()>;

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()>;

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>>;

    async fn get_warehouse_by_code(&self, code: &str) -> Result<Option<Warehouse>>;

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>>;

    async fn insert_zone(&self, zone: &Zone) -> Result<()>;

    async fn get_zone(&self, id: ZoneId) -> Result<Option<Zone>>;

    async fn list_zones(&self, warehouse_id: WarehouseId) -> Result<Vec<Zone>>;

    async fn insert_location(&self, location: &Location) -> Result<()>;

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>>;

    async fn list_locations(&self, warehouse_id: WarehouseId) -> Result<Vec<Location>>;

    /// Units of all items currently held at a location.
    async fn location_occupancy(&self, id: LocationId) -> Result<i64>;

    // Items

    async fn get_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>>;

    async fn find_item(&self, sku: &Sku, warehouse_id: WarehouseId)
    -> Result<Option<InventoryItem>>;

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<InventoryItem>>;

    // Allocations

    async fn get_allocation(&self, id: AllocationId) -> Result<Option<Allocation>>;

    /// Finds the live (not cancelled) allocation for an order line and item.
    async fn find_allocation(
        &self,
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
    ) -> Result<Option<Allocation>>;

    async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>>;

    /// Pending allocations whose expiry is at or before `now`, oldest first.
    async fn due_allocations(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Allocation>>;

    // Outbox

    /// Undelivered messages with fewer than `max_attempts` attempts, oldest first.
    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxMessage>>;

    async fn mark_dispatched(&self, id: MessageId, at: DateTime<Utc>) -> Result<()>;

    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()>;

    // Writes

    /// Applies a unit of work atomically.
    ///
    /// Fails with `ItemVersionConflict`, `AllocationVersionConflict` or a
    /// ledger `SequenceConflict` if another writer got there first, with
    /// `LocationCapacityExceeded` if the item write overfills a location, and
    /// with `DuplicateAllocation` if the order line already holds a live
    /// allocation on the item. Nothing is written in any of these cases.
    async fn commit(&self, unit: UnitOfWork) -> Result<()>;
}
