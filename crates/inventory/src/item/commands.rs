//! Requests accepted by the inventory item store.

use common::{LocationId, ProductId, Sku, TransactionId, WarehouseId};
use serde::Deserialize;
use stock_ledger::{Reference, TransactionType};

use super::ItemAttributes;

fn system() -> String {
    "system".to_string()
}

/// Request to start stocking a SKU in a warehouse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub sku: Sku,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub reorder_threshold: i64,
    #[serde(default)]
    pub target_stock_level: i64,
    #[serde(default)]
    pub unit_cost_cents: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub attributes: ItemAttributes,
}

impl NewItem {
    pub fn new(
        sku: impl Into<Sku>,
        product_id: impl Into<ProductId>,
        warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            sku: sku.into(),
            product_id: product_id.into(),
            warehouse_id,
            reorder_threshold: 0,
            target_stock_level: 0,
            unit_cost_cents: 0,
            category: None,
            attributes: ItemAttributes::new(),
        }
    }

    pub fn thresholds(mut self, reorder_threshold: i64, target_stock_level: i64) -> Self {
        self.reorder_threshold = reorder_threshold;
        self.target_stock_level = target_stock_level;
        self
    }

    pub fn unit_cost_cents(mut self, cents: i64) -> Self {
        self.unit_cost_cents = cents;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn attributes(mut self, attributes: ItemAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Receive stock into a location (RECEIPT).
#[derive(Debug, Clone)]
pub struct AddStock {
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    /// Idempotency key; a retried request with the same reference is replayed.
    pub reference: Option<Reference>,
    pub created_by: String,
}

impl AddStock {
    pub fn new(quantity: i64) -> Self {
        Self {
            quantity,
            location_id: None,
            reference: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Apply a signed correction to on-hand stock (ADJUSTMENT).
#[derive(Debug, Clone)]
pub struct AdjustStock {
    pub quantity: i64,
    pub reason: String,
    pub location_id: Option<LocationId>,
    pub reference: Option<Reference>,
    pub created_by: String,
}

impl AdjustStock {
    pub fn new(quantity: i64, reason: impl Into<String>) -> Self {
        Self {
            quantity,
            reason: reason.into(),
            location_id: None,
            reference: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Consume reserved stock (SALE).
#[derive(Debug, Clone)]
pub struct CommitSale {
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reference: Option<Reference>,
    pub created_by: String,
}

impl CommitSale {
    pub fn new(quantity: i64) -> Self {
        Self {
            quantity,
            location_id: None,
            reference: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: Option<LocationId>) -> Self {
        self.location_id = location_id;
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Take returned goods back into stock (RETURN).
#[derive(Debug, Clone)]
pub struct RecordReturn {
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reference: Option<Reference>,
    pub reason: Option<String>,
    pub created_by: String,
}

impl RecordReturn {
    pub fn new(quantity: i64) -> Self {
        Self {
            quantity,
            location_id: None,
            reference: None,
            reason: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Why stock is being written off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LossKind {
    Damage,
    Expiry,
}

impl LossKind {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            LossKind::Damage => TransactionType::Damage,
            LossKind::Expiry => TransactionType::Expiry,
        }
    }
}

/// Write off damaged or expired stock (DAMAGE / EXPIRY).
///
/// `quantity` is the positive number of units lost.
#[derive(Debug, Clone)]
pub struct RecordLoss {
    pub kind: LossKind,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub reason: Option<String>,
    pub created_by: String,
}

impl RecordLoss {
    pub fn damage(quantity: i64) -> Self {
        Self::new(LossKind::Damage, quantity)
    }

    pub fn expiry(quantity: i64) -> Self {
        Self::new(LossKind::Expiry, quantity)
    }

    pub fn new(kind: LossKind, quantity: i64) -> Self {
        Self {
            kind,
            quantity,
            location_id: None,
            reason: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Record a physical count (CYCLE_COUNT).
///
/// With a location the count covers that location only; otherwise it covers
/// the whole item.
#[derive(Debug, Clone)]
pub struct RecordCycleCount {
    pub counted: i64,
    pub location_id: Option<LocationId>,
    pub reference: Option<Reference>,
    pub created_by: String,
}

impl RecordCycleCount {
    pub fn new(counted: i64) -> Self {
        Self {
            counted,
            location_id: None,
            reference: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// Move units between two locations of the same item (LOCATION_ASSIGNMENT).
#[derive(Debug, Clone)]
pub struct AssignLocation {
    pub from: LocationId,
    pub to: LocationId,
    pub quantity: i64,
    pub created_by: String,
}

impl AssignLocation {
    pub fn new(from: LocationId, to: LocationId, quantity: i64) -> Self {
        Self {
            from,
            to,
            quantity,
            created_by: system(),
        }
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// A signed on-hand movement with caller-chosen transaction ids.
///
/// Used for the legs of a transfer and for compensating adjustments, where
/// the transaction id must be known before the write so the legs can link to
/// each other.
#[derive(Debug, Clone)]
pub struct StockMovement {
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub location_id: Option<LocationId>,
    pub transaction_id: TransactionId,
    pub related_transaction_id: Option<TransactionId>,
    pub reference: Option<Reference>,
    pub reason: Option<String>,
    pub created_by: String,
}

impl StockMovement {
    pub fn new(transaction_type: TransactionType, quantity: i64) -> Self {
        Self {
            transaction_type,
            quantity,
            location_id: None,
            transaction_id: TransactionId::new(),
            related_transaction_id: None,
            reference: None,
            reason: None,
            created_by: system(),
        }
    }

    pub fn at(mut self, location_id: Option<LocationId>) -> Self {
        self.location_id = location_id;
        self
    }

    pub fn with_id(mut self, transaction_id: TransactionId) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub fn related_to(mut self, transaction_id: TransactionId) -> Self {
        self.related_transaction_id = Some(transaction_id);
        self
    }

    pub fn reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}
