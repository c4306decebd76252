//! Inventory items: the current-state projection per SKU and warehouse.
//!
//! Quantities only change by applying a [`StockChange`], which produces the
//! next item state together with the ledger transaction that records it.

mod attributes;
mod commands;
mod store;

pub use attributes::{AttributeValue, ItemAttributes, MAX_ATTRIBUTES};
pub use commands::{
    AddStock, AdjustStock, AssignLocation, CommitSale, LossKind, NewItem, RecordCycleCount,
    RecordLoss, RecordReturn, StockMovement,
};
pub use store::{InventoryItemStore, StockMutation};
pub(crate) use store::{Plan, release_change};

use chrono::{DateTime, Utc};
use common::{InventoryItemId, LocationId, ProductId, Sku, TransactionId, WarehouseId};
use serde::{Deserialize, Serialize};
use stock_ledger::{Reference, Sequence, StockTransaction, TransactionType};

use crate::error::InventoryError;

/// Quantity of an item held at one bin location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuantity {
    pub location_id: LocationId,
    pub quantity: i64,
}

/// One SKU stocked in one warehouse.
///
/// Invariants: `0 <= quantity_reserved <= quantity_on_hand`, and the
/// per-location quantities sum to `quantity_on_hand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub sku: Sku,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub reorder_threshold: i64,
    pub target_stock_level: i64,
    pub unit_cost_cents: i64,
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: ItemAttributes,
    pub is_active: bool,
    /// Locations in the order they were first stocked.
    pub locations: Vec<LocationQuantity>,
    /// Sequence of the last ledger transaction recorded for this item.
    pub ledger_sequence: Sequence,
    /// Optimistic concurrency token; bumped by every write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Quantity eligible for new reservations.
    pub fn quantity_available(&self) -> i64 {
        self.quantity_on_hand - self.quantity_reserved
    }

    /// Quantity held at `location_id`.
    pub fn quantity_at(&self, location_id: LocationId) -> i64 {
        self.locations
            .iter()
            .find(|l| l.location_id == location_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    /// Returns true if available stock is at or below the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.quantity_available() <= self.reorder_threshold
    }

    /// Checks the quantity invariants.
    pub fn check_invariants(&self) -> Result<(), InventoryError> {
        if self.quantity_reserved < 0 || self.quantity_reserved > self.quantity_on_hand {
            return Err(InventoryError::Validation(format!(
                "item {} has reserved {} of {} on hand",
                self.id, self.quantity_reserved, self.quantity_on_hand
            )));
        }
        let located: i64 = self.locations.iter().map(|l| l.quantity).sum();
        if located != self.quantity_on_hand {
            return Err(InventoryError::Validation(format!(
                "item {} has {} on hand but {} across locations",
                self.id, self.quantity_on_hand, located
            )));
        }
        Ok(())
    }

    /// Applies a change, returning the next state and the transaction recording it.
    ///
    /// Nothing is mutated; the caller persists both halves atomically.
    pub fn apply(
        &self,
        change: &StockChange,
        now: DateTime<Utc>,
    ) -> Result<AppliedChange, InventoryError> {
        let kind = change.transaction_type;
        let quantity = change.quantity;

        if !kind.accepts_quantity(quantity) {
            return Err(InventoryError::Validation(format!(
                "quantity {quantity} is not valid for {kind}"
            )));
        }
        if !self.is_active && kind != TransactionType::ReservationRelease {
            return Err(InventoryError::ItemNotFound(self.id));
        }

        let mut next = self.clone();
        let mut location_id = change.location_id;

        match kind {
            TransactionType::Reservation => {
                if self.quantity_available() < quantity {
                    return Err(InventoryError::InsufficientStock {
                        item_id: self.id,
                        requested: quantity,
                        available: self.quantity_available(),
                    });
                }
                next.quantity_reserved += quantity;
            }
            TransactionType::ReservationRelease => {
                if self.quantity_reserved < -quantity {
                    return Err(InventoryError::InsufficientReservedStock {
                        item_id: self.id,
                        requested: -quantity,
                        reserved: self.quantity_reserved,
                    });
                }
                next.quantity_reserved += quantity;
            }
            TransactionType::Sale => {
                let units = -quantity;
                if self.quantity_reserved < units {
                    return Err(InventoryError::InsufficientReservedStock {
                        item_id: self.id,
                        requested: units,
                        reserved: self.quantity_reserved,
                    });
                }
                location_id = next.take(units, change.location_id)?;
                next.quantity_reserved -= units;
                next.quantity_on_hand -= units;
            }
            TransactionType::LocationAssignment => {
                let (Some(from), Some(to)) = (change.location_id, change.destination_location_id)
                else {
                    return Err(InventoryError::Validation(
                        "location assignment needs a source and a destination".to_string(),
                    ));
                };
                if from == to {
                    return Err(InventoryError::Validation(
                        "source and destination locations must differ".to_string(),
                    ));
                }
                next.take(quantity, Some(from))?;
                next.put(quantity, to);
                location_id = Some(to);
            }
            _ if quantity > 0 => {
                let Some(target) = change.location_id else {
                    return Err(InventoryError::Validation(format!(
                        "{kind} needs a target location"
                    )));
                };
                next.put(quantity, target);
                next.quantity_on_hand += quantity;
            }
            _ if quantity < 0 => {
                let units = -quantity;
                if self.quantity_available() < units {
                    return Err(InventoryError::InsufficientStock {
                        item_id: self.id,
                        requested: units,
                        available: self.quantity_available(),
                    });
                }
                location_id = next.take(units, change.location_id)?;
                next.quantity_on_hand -= units;
            }
            // Zero-delta cycle count: a confirmed count, nothing moves.
            _ => {}
        }

        let (previous, new) = if kind.tracks_reserved() {
            (self.quantity_reserved, next.quantity_reserved)
        } else {
            (self.quantity_on_hand, next.quantity_on_hand)
        };

        let sequence = self.ledger_sequence.next();
        let transaction = StockTransaction::builder()
            .id(change.transaction_id.unwrap_or_default())
            .transaction_type(kind)
            .inventory_item_id(self.id)
            .sequence(sequence)
            .quantity(quantity)
            .warehouse_id(self.warehouse_id)
            .location_id(location_id)
            .reference(change.reference.clone())
            .related_transaction_id(change.related_transaction_id)
            .quantities(previous, new)
            .reason(change.reason.clone())
            .created_at(now)
            .created_by(change.created_by.clone())
            .build()?;

        next.ledger_sequence = sequence;
        next.version += 1;
        next.updated_at = now;

        Ok(AppliedChange {
            item: next,
            transaction,
        })
    }

    fn put(&mut self, quantity: i64, location_id: LocationId) {
        match self
            .locations
            .iter_mut()
            .find(|l| l.location_id == location_id)
        {
            Some(entry) => entry.quantity += quantity,
            None => self.locations.push(LocationQuantity {
                location_id,
                quantity,
            }),
        }
    }

    /// Removes `units` from one named location, or from locations in stocking
    /// order when none is named. Returns the location drawn from when there
    /// was exactly one.
    fn take(
        &mut self,
        units: i64,
        location_id: Option<LocationId>,
    ) -> Result<Option<LocationId>, InventoryError> {
        if let Some(location_id) = location_id {
            let held = self.quantity_at(location_id);
            if held < units {
                return Err(InventoryError::InsufficientLocationStock {
                    item_id: self.id,
                    location_id,
                    requested: units,
                    available: held,
                });
            }
            self.put(-units, location_id);
            self.locations.retain(|l| l.quantity > 0);
            return Ok(Some(location_id));
        }

        let mut remaining = units;
        let mut drawn = Vec::new();
        for entry in self.locations.iter_mut() {
            if remaining == 0 {
                break;
            }
            let taken = remaining.min(entry.quantity);
            if taken > 0 {
                entry.quantity -= taken;
                remaining -= taken;
                drawn.push(entry.location_id);
            }
        }
        if remaining > 0 {
            return Err(InventoryError::InsufficientStock {
                item_id: self.id,
                requested: units,
                available: units - remaining,
            });
        }
        self.locations.retain(|l| l.quantity > 0);
        Ok(match drawn.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }
}

/// A requested change to an item's quantities.
#[derive(Debug, Clone)]
pub struct StockChange {
    pub transaction_type: TransactionType,
    /// Signed according to the transaction type.
    pub quantity: i64,
    /// Target location for increments, source for decrements and moves.
    pub location_id: Option<LocationId>,
    /// Destination of a location assignment.
    pub destination_location_id: Option<LocationId>,
    pub reference: Option<Reference>,
    pub related_transaction_id: Option<TransactionId>,
    /// Pre-allocated id for the resulting transaction.
    pub transaction_id: Option<TransactionId>,
    pub reason: Option<String>,
    pub created_by: String,
}

impl StockChange {
    pub fn new(transaction_type: TransactionType, quantity: i64) -> Self {
        Self {
            transaction_type,
            quantity,
            location_id: None,
            destination_location_id: None,
            reference: None,
            related_transaction_id: None,
            transaction_id: None,
            reason: None,
            created_by: "system".to_string(),
        }
    }

    pub fn at(mut self, location_id: Option<LocationId>) -> Self {
        self.location_id = location_id;
        self
    }

    pub fn to(mut self, location_id: LocationId) -> Self {
        self.destination_location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }

    pub fn related_to(mut self, transaction_id: Option<TransactionId>) -> Self {
        self.related_transaction_id = transaction_id;
        self
    }

    pub fn with_id(mut self, transaction_id: Option<TransactionId>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Units added to a location by this change, if any.
    pub(crate) fn incoming(&self) -> Option<(LocationId, i64)> {
        match self.transaction_type {
            TransactionType::LocationAssignment => {
                self.destination_location_id.map(|to| (to, self.quantity))
            }
            t if t.on_hand_effect(self.quantity) > 0 => {
                self.location_id.map(|to| (to, self.quantity))
            }
            _ => None,
        }
    }
}

/// Result of applying a [`StockChange`].
#[derive(Debug, Clone)]
pub struct AppliedChange {
    pub item: InventoryItem,
    pub transaction: StockTransaction,
}

/// Filter for listing items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub sku: Option<Sku>,
    pub category: Option<String>,
    /// Include deactivated items.
    pub include_inactive: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn sku(mut self, sku: Sku) -> Self {
        self.sku = Some(sku);
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    pub fn matches(&self, item: &InventoryItem) -> bool {
        if !self.include_inactive && !item.is_active {
            return false;
        }
        if let Some(id) = self.warehouse_id
            && item.warehouse_id != id
        {
            return false;
        }
        if let Some(ref sku) = self.sku
            && &item.sku != sku
        {
            return false;
        }
        if let Some(ref category) = self.category
            && item.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        true
    }
}
