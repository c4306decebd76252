use chrono::{DateTime, Utc};
use common::{InventoryItemId, TransactionId, WarehouseId};

use crate::{Reference, StockTransaction, TransactionType};

/// Builder for constructing ledger queries.
///
/// Filters combine with AND; `transaction_types` matches any of the listed types.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    /// Filter by inventory item.
    pub inventory_item_id: Option<InventoryItemId>,

    /// Filter by warehouse.
    pub warehouse_id: Option<WarehouseId>,

    /// Filter by transaction types (any of these types).
    pub transaction_types: Option<Vec<TransactionType>>,

    /// Filter by external reference.
    pub reference: Option<Reference>,

    /// Filter by the linked transaction.
    pub related_transaction_id: Option<TransactionId>,

    /// Filter by transactions created at or after this time.
    pub from: Option<DateTime<Utc>>,

    /// Filter by transactions created at or before this time.
    pub to: Option<DateTime<Utc>>,

    /// Maximum number of transactions to return.
    pub limit: Option<usize>,

    /// Number of transactions to skip.
    pub offset: Option<usize>,
}

impl TransactionQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for a specific item.
    pub fn for_item(item_id: InventoryItemId) -> Self {
        Self {
            inventory_item_id: Some(item_id),
            ..Default::default()
        }
    }

    /// Creates a query for a specific warehouse.
    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self {
            warehouse_id: Some(warehouse_id),
            ..Default::default()
        }
    }

    pub fn item(mut self, item_id: InventoryItemId) -> Self {
        self.inventory_item_id = Some(item_id);
        self
    }

    pub fn warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_types = Some(vec![transaction_type]);
        self
    }

    pub fn transaction_types(mut self, types: Vec<TransactionType>) -> Self {
        self.transaction_types = Some(types);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn related_to(mut self, transaction_id: TransactionId) -> Self {
        self.related_transaction_id = Some(transaction_id);
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns true if `tx` satisfies every filter (limit/offset excluded).
    pub fn matches(&self, tx: &StockTransaction) -> bool {
        if let Some(id) = self.inventory_item_id
            && tx.inventory_item_id != id
        {
            return false;
        }
        if let Some(id) = self.warehouse_id
            && tx.warehouse_id != id
        {
            return false;
        }
        if let Some(ref types) = self.transaction_types
            && !types.contains(&tx.transaction_type)
        {
            return false;
        }
        if let Some(ref reference) = self.reference
            && !tx.has_reference(reference)
        {
            return false;
        }
        if let Some(related) = self.related_transaction_id
            && tx.related_transaction_id != Some(related)
        {
            return false;
        }
        if let Some(from) = self.from
            && tx.created_at < from
        {
            return false;
        }
        if let Some(to) = self.to
            && tx.created_at > to
        {
            return false;
        }
        true
    }
}
