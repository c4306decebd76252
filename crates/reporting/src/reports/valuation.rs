//! Stock value at unit cost.

use std::collections::BTreeMap;

use common::WarehouseId;
use inventory::InventoryItem;
use serde::{Deserialize, Serialize};

const UNCATEGORIZED: &str = "uncategorized";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueGrouping {
    #[default]
    Warehouse,
    Category,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueQuery {
    #[serde(default)]
    pub group_by: ValueGrouping,
    pub warehouse_id: Option<WarehouseId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueGroup {
    /// Warehouse id or category name.
    pub key: String,
    pub item_count: usize,
    pub quantity_on_hand: i64,
    pub value_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryValueReport {
    pub group_by: ValueGrouping,
    pub groups: Vec<ValueGroup>,
    pub total_quantity_on_hand: i64,
    pub total_value_cents: i64,
}

/// Sums on-hand quantity times unit cost per group.
pub fn inventory_value(items: &[InventoryItem], group_by: ValueGrouping) -> InventoryValueReport {
    let mut groups: BTreeMap<String, ValueGroup> = BTreeMap::new();
    for item in items.iter().filter(|i| i.is_active) {
        let key = match group_by {
            ValueGrouping::Warehouse => item.warehouse_id.to_string(),
            ValueGrouping::Category => item
                .category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        };
        let group = groups.entry(key.clone()).or_insert_with(|| ValueGroup {
            key,
            item_count: 0,
            quantity_on_hand: 0,
            value_cents: 0,
        });
        group.item_count += 1;
        group.quantity_on_hand += item.quantity_on_hand;
        group.value_cents += item.quantity_on_hand * item.unit_cost_cents;
    }

    let groups: Vec<ValueGroup> = groups.into_values().collect();
    InventoryValueReport {
        group_by,
        total_quantity_on_hand: groups.iter().map(|g| g.quantity_on_hand).sum(),
        total_value_cents: groups.iter().map(|g| g.value_cents).sum(),
        groups,
    }
}
