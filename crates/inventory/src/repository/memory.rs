use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AllocationId, InventoryItemId, LocationId, MessageId, OrderId, OrderItemId, Sku, WarehouseId,
    ZoneId,
};
use stock_ledger::{AppendOptions, InMemoryStockLedger, Sequence, StockLedger};
use tokio::sync::RwLock;

use super::{AllocationWrite, InventoryRepository, Result, UnitOfWork};
use crate::allocation::{Allocation, AllocationFilter, AllocationStatus};
use crate::error::RepositoryError;
use crate::item::{InventoryItem, ItemFilter};
use crate::outbox::OutboxMessage;
use crate::warehouse::{Location, Warehouse, Zone};

#[derive(Default)]
struct State {
    warehouses: HashMap<WarehouseId, Warehouse>,
    zones: HashMap<ZoneId, Zone>,
    locations: HashMap<LocationId, Location>,
    items: HashMap<InventoryItemId, InventoryItem>,
    allocations: HashMap<AllocationId, Allocation>,
    outbox: Vec<OutboxMessage>,
}

impl State {
    /// Fails if `item` now holds more at a location than the location's item
    /// limit leaves room for, counting every item stored there.
    fn check_capacity(&self, item: &InventoryItem) -> Result<()> {
        let previous = self.items.get(&item.id);
        for entry in &item.locations {
            let increase =
                entry.quantity - previous.map_or(0, |p| p.quantity_at(entry.location_id));
            if increase <= 0 {
                continue;
            }
            let Some(max) = self
                .locations
                .get(&entry.location_id)
                .and_then(|l| l.capacity.max_items)
            else {
                continue;
            };
            let occupied: i64 = self
                .items
                .values()
                .map(|i| i.quantity_at(entry.location_id))
                .sum();
            if occupied + increase > max {
                return Err(RepositoryError::LocationCapacityExceeded {
                    location_id: entry.location_id,
                    capacity: max,
                    occupied,
                    requested: increase,
                });
            }
        }
        Ok(())
    }

    /// One live allocation per order line and inventory item.
    fn check_unique_allocation(&self, allocation: &Allocation) -> Result<()> {
        if allocation.status == AllocationStatus::Cancelled {
            return Ok(());
        }
        let clash = self.allocations.values().any(|a| {
            a.id != allocation.id
                && a.order_id == allocation.order_id
                && a.order_item_id == allocation.order_item_id
                && a.inventory_item_id == allocation.inventory_item_id
                && a.status != AllocationStatus::Cancelled
        });
        if clash {
            return Err(RepositoryError::DuplicateAllocation {
                order_id: allocation.order_id,
                order_item_id: allocation.order_item_id,
                inventory_item_id: allocation.inventory_item_id,
            });
        }
        Ok(())
    }
}

/// In-memory repository for tests and single-process deployments.
///
/// A commit holds the state lock while it appends to the ledger, so the
/// item row and its ledger entries change together.
#[derive(Clone, Default)]
pub struct InMemoryInventoryRepository {
    state: Arc<RwLock<State>>,
    ledger: InMemoryStockLedger,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outbox messages, delivered or not.
    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }
}

fn paginate<T>(items: Vec<T>, offset: Option<usize>, limit: Option<usize>) -> Vec<T> {
    let items = items.into_iter().skip(offset.unwrap_or(0));
    match limit {
        Some(limit) => items.take(limit).collect(),
        None => items.collect(),
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    type Ledger = InMemoryStockLedger;

    fn ledger(&self) -> &InMemoryStockLedger {
        &self.ledger
    }

    async fn insert_warehouse(
        &self,
        warehouse: &Warehouse,
        zones: &[Zone],
        locations: &[Location],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if state.warehouses.values().any(|w| w.code == warehouse.code) {
            return Err(RepositoryError::DuplicateWarehouseCode(
                warehouse.code.clone(),
            ));
        }
        state.warehouses.insert(warehouse.id, warehouse.clone());
        for zone in zones {
            state.zones.insert(zone.id, zone.clone());
        }
        for location in locations {
            state.locations.insert(location.id, location.clone());
        }
        Ok(())
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let mut state = self.state.write().await;
        match state.warehouses.get_mut(&warehouse.id) {
            Some(existing) => {
                *existing = warehouse.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound {
                entity: "Warehouse",
                id: warehouse.id.to_string(),
            }),
        }
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>> {
        Ok(self.state.read().await.warehouses.get(&id).cloned())
    }

    async fn get_warehouse_by_code(&self, code: &str) -> Result<Option<Warehouse>> {
        let state = self.state.read().await;
        Ok(state.warehouses.values().find(|w| w.code == code).cloned())
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let state = self.state.read().await;
        let mut warehouses: Vec<_> = state.warehouses.values().cloned().collect();
        warehouses.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(warehouses)
    }

    async fn insert_zone(&self, zone: &Zone) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.warehouses.contains_key(&zone.warehouse_id) {
            return Err(RepositoryError::NotFound {
                entity: "Warehouse",
                id: zone.warehouse_id.to_string(),
            });
        }
        state.zones.insert(zone.id, zone.clone());
        Ok(())
    }

    async fn get_zone(&self, id: ZoneId) -> Result<Option<Zone>> {
        Ok(self.state.read().await.zones.get(&id).cloned())
    }

    async fn list_zones(&self, warehouse_id: WarehouseId) -> Result<Vec<Zone>> {
        let state = self.state.read().await;
        let mut zones: Vec<_> = state
            .zones
            .values()
            .filter(|z| z.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        zones.sort_by_key(|z| z.created_at);
        Ok(zones)
    }

    async fn insert_location(&self, location: &Location) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.zones.contains_key(&location.zone_id) {
            return Err(RepositoryError::NotFound {
                entity: "Zone",
                id: location.zone_id.to_string(),
            });
        }
        if state
            .locations
            .values()
            .any(|l| l.warehouse_id == location.warehouse_id && l.code == location.code)
        {
            return Err(RepositoryError::DuplicateLocationCode(location.code.clone()));
        }
        state.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>> {
        Ok(self.state.read().await.locations.get(&id).cloned())
    }

    async fn list_locations(&self, warehouse_id: WarehouseId) -> Result<Vec<Location>> {
        let state = self.state.read().await;
        let mut locations: Vec<_> = state
            .locations
            .values()
            .filter(|l| l.warehouse_id == warehouse_id)
            .cloned()
            .collect();
        locations.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(locations)
    }

    async fn location_occupancy(&self, id: LocationId) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state.items.values().map(|item| item.quantity_at(id)).sum())
    }

    async fn get_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn find_item(
        &self,
        sku: &Sku,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryItem>> {
        let state = self.state.read().await;
        Ok(state
            .items
            .values()
            .find(|i| &i.sku == sku && i.warehouse_id == warehouse_id)
            .cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<InventoryItem>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .items
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.sku
                .cmp(&b.sku)
                .then(a.warehouse_id.cmp(&b.warehouse_id))
        });
        Ok(paginate(items, filter.offset, filter.limit))
    }

    async fn get_allocation(&self, id: AllocationId) -> Result<Option<Allocation>> {
        Ok(self.state.read().await.allocations.get(&id).cloned())
    }

    async fn find_allocation(
        &self,
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
    ) -> Result<Option<Allocation>> {
        let state = self.state.read().await;
        Ok(state
            .allocations
            .values()
            .find(|a| {
                a.order_id == order_id
                    && a.order_item_id == order_item_id
                    && a.inventory_item_id == inventory_item_id
                    && a.status != AllocationStatus::Cancelled
            })
            .cloned())
    }

    async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>> {
        let state = self.state.read().await;
        let mut allocations: Vec<_> = state
            .allocations
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        allocations.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(allocations, filter.offset, filter.limit))
    }

    async fn due_allocations(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Allocation>> {
        let state = self.state.read().await;
        let mut due: Vec<_> = state
            .allocations
            .values()
            .filter(|a| a.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|a| a.expires_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxMessage>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|m| m.dispatched_at.is_none() && (m.attempts as i64) < max_attempts as i64)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, id: MessageId, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(message) = state.outbox.iter_mut().find(|m| m.id == id) {
            message.attempts += 1;
            message.dispatched_at = Some(at);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(message) = state.outbox.iter_mut().find(|m| m.id == id) {
            message.attempts += 1;
            message.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        let mut state = self.state.write().await;

        // Check every precondition before the first write.
        if let Some(write) = &unit.item {
            let item = &write.item;
            match write.expected_version {
                Some(expected) => {
                    let current = state.items.get(&item.id).ok_or_else(|| {
                        RepositoryError::NotFound {
                            entity: "InventoryItem",
                            id: item.id.to_string(),
                        }
                    })?;
                    if current.version != expected {
                        return Err(RepositoryError::ItemVersionConflict {
                            item_id: item.id,
                            expected,
                        });
                    }
                }
                None => {
                    if state
                        .items
                        .values()
                        .any(|i| i.sku == item.sku && i.warehouse_id == item.warehouse_id)
                    {
                        return Err(RepositoryError::DuplicateItem {
                            sku: item.sku.clone(),
                            warehouse_id: item.warehouse_id,
                        });
                    }
                }
            }
            state.check_capacity(item)?;
        }

        match &unit.allocation {
            Some(AllocationWrite::Update {
                allocation,
                expected_version,
            }) => {
                let current = state.allocations.get(&allocation.id).ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "Allocation",
                        id: allocation.id.to_string(),
                    }
                })?;
                if current.version != *expected_version {
                    return Err(RepositoryError::AllocationVersionConflict {
                        allocation_id: allocation.id,
                        expected: *expected_version,
                    });
                }
            }
            Some(AllocationWrite::Insert(allocation)) => {
                if state.allocations.contains_key(&allocation.id) {
                    return Err(RepositoryError::AllocationVersionConflict {
                        allocation_id: allocation.id,
                        expected: 0,
                    });
                }
            }
            None => {}
        }
        if let Some(write) = &unit.allocation {
            state.check_unique_allocation(write.allocation())?;
        }

        // The ledger append is the last fallible step.
        if let Some(write) = &unit.item
            && let Some(first) = write.transactions.first()
        {
            let expected = Sequence::new(first.sequence.as_i64() - 1);
            self.ledger
                .append(
                    write.transactions.clone(),
                    AppendOptions::expect_sequence(expected),
                )
                .await?;
        }

        if let Some(write) = unit.item {
            state.items.insert(write.item.id, write.item);
        }
        if let Some(write) = unit.allocation {
            let allocation = match write {
                AllocationWrite::Insert(allocation) => allocation,
                AllocationWrite::Update { allocation, .. } => allocation,
            };
            state.allocations.insert(allocation.id, allocation);
        }
        state.outbox.extend(unit.outbox);

        Ok(())
    }
}
