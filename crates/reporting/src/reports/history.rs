//! Quantity history of one item.

use inventory::InventoryItem;
use serde::Serialize;
use stock_ledger::{Reconciliation, ReplayPoint};

/// Every ledger step of an item, with a reconciliation against its current
/// quantities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemHistory {
    pub item: InventoryItem,
    pub points: Vec<ReplayPoint>,
    pub reconciliation: Reconciliation,
}
