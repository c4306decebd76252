//! Items at or below their reorder point.

use common::{InventoryItemId, ProductId, Sku, WarehouseId};
use inventory::InventoryItem;
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockQuery {
    pub warehouse_id: Option<WarehouseId>,
    /// When set, an item is low once available stock falls to this
    /// percentage of its target level, instead of its reorder threshold.
    pub threshold_percentage: Option<f64>,
}

impl LowStockQuery {
    pub fn validate(&self) -> Result<()> {
        if let Some(pct) = self.threshold_percentage
            && !(pct.is_finite() && (0.0..=100.0).contains(&pct))
        {
            return Err(ReportError::Validation(format!(
                "thresholdPercentage must be between 0 and 100, got {pct}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub inventory_item_id: InventoryItemId,
    pub sku: Sku,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_on_hand: i64,
    pub quantity_reserved: i64,
    pub quantity_available: i64,
    pub reorder_threshold: i64,
    pub target_stock_level: i64,
    pub suggested_reorder_quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockSummary {
    pub item_count: usize,
    pub out_of_stock_count: usize,
    pub total_suggested_reorder_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockReport {
    pub items: Vec<LowStockItem>,
    pub summary: LowStockSummary,
}

fn is_low(item: &InventoryItem, threshold_percentage: Option<f64>) -> bool {
    let available = item.quantity_available();
    match threshold_percentage {
        Some(pct) => available as f64 <= item.target_stock_level as f64 * pct / 100.0,
        None => available <= item.reorder_threshold,
    }
}

/// Builds the report from active items, emptiest first.
pub fn low_stock(items: &[InventoryItem], threshold_percentage: Option<f64>) -> LowStockReport {
    let mut low: Vec<LowStockItem> = items
        .iter()
        .filter(|item| item.is_active && is_low(item, threshold_percentage))
        .map(|item| LowStockItem {
            inventory_item_id: item.id,
            sku: item.sku.clone(),
            product_id: item.product_id.clone(),
            warehouse_id: item.warehouse_id,
            quantity_on_hand: item.quantity_on_hand,
            quantity_reserved: item.quantity_reserved,
            quantity_available: item.quantity_available(),
            reorder_threshold: item.reorder_threshold,
            target_stock_level: item.target_stock_level,
            suggested_reorder_quantity: (item.target_stock_level - item.quantity_available())
                .max(0),
        })
        .collect();
    low.sort_by(|a, b| {
        a.quantity_available
            .cmp(&b.quantity_available)
            .then_with(|| a.sku.cmp(&b.sku))
    });

    let summary = LowStockSummary {
        item_count: low.len(),
        out_of_stock_count: low.iter().filter(|i| i.quantity_available <= 0).count(),
        total_suggested_reorder_quantity: low.iter().map(|i| i.suggested_reorder_quantity).sum(),
    };
    LowStockReport {
        items: low,
        summary,
    }
}
