//! Inventory turnover over a period.

use chrono::{DateTime, Utc};
use common::{InventoryItemId, WarehouseId};
use inventory::InventoryItem;
use serde::{Deserialize, Serialize};
use stock_ledger::{ReplayPoint, TransactionType};

use crate::timeline;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverQuery {
    pub inventory_item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnoverReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub items_considered: usize,
    pub units_sold: i64,
    /// Units sold times unit cost.
    pub cost_of_goods_moved_cents: i64,
    /// Time-weighted mean on-hand quantity times unit cost.
    pub average_inventory_value_cents: f64,
    /// None when no stock was held during the period.
    pub turnover_ratio: Option<f64>,
}

/// Accumulates turnover one item at a time.
#[derive(Debug, Default)]
pub(crate) struct TurnoverAccumulator {
    items: usize,
    units_sold: i64,
    cost_of_goods_cents: i64,
    average_value_cents: f64,
}

impl TurnoverAccumulator {
    pub fn add(
        &mut self,
        item: &InventoryItem,
        points: &[ReplayPoint],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) {
        let sold: i64 = points
            .iter()
            .filter(|p| p.transaction_type == TransactionType::Sale)
            .filter(|p| p.created_at >= from && p.created_at <= to)
            .map(|p| -p.quantity)
            .sum();
        let segments = timeline::segments(points, from, to, |p| p.on_hand);
        let average_on_hand = timeline::time_weighted_mean(&segments);

        self.items += 1;
        self.units_sold += sold;
        self.cost_of_goods_cents += sold * item.unit_cost_cents;
        self.average_value_cents += average_on_hand * item.unit_cost_cents as f64;
    }

    pub fn finish(self, from: DateTime<Utc>, to: DateTime<Utc>) -> TurnoverReport {
        let turnover_ratio = if self.average_value_cents > 0.0 {
            Some(self.cost_of_goods_cents as f64 / self.average_value_cents)
        } else {
            None
        };
        TurnoverReport {
            from,
            to,
            items_considered: self.items,
            units_sold: self.units_sold,
            cost_of_goods_moved_cents: self.cost_of_goods_cents,
            average_inventory_value_cents: self.average_value_cents,
            turnover_ratio,
        }
    }
}
