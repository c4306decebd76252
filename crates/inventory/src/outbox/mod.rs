//! Outbound notifications.
//!
//! Notifications are written to the outbox in the same unit of work as the
//! stock mutation that caused them and delivered later by the
//! [`OutboxDispatcher`]. Delivery failures never affect committed stock.

mod dispatcher;

pub use dispatcher::{
    DispatchSummary, InMemorySink, LoggingSink, NotificationSink, OutboxDispatcher, SinkError,
};

use chrono::{DateTime, Utc};
use common::{InventoryItemId, MessageId, Sku, WarehouseId};
use serde::{Deserialize, Serialize};
use stock_ledger::{StockTransaction, TransactionType};

use crate::item::InventoryItem;

/// State-change notification for other bounded contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InventoryNotification {
    #[serde(rename = "InventoryRestocked", rename_all = "camelCase")]
    InventoryRestocked {
        inventory_item_id: InventoryItemId,
        sku: Sku,
        warehouse_id: WarehouseId,
        quantity_added: i64,
        quantity_available: i64,
    },

    #[serde(rename = "LowStockAlert", rename_all = "camelCase")]
    LowStockAlert {
        inventory_item_id: InventoryItemId,
        sku: Sku,
        warehouse_id: WarehouseId,
        quantity_available: i64,
        reorder_threshold: i64,
        target_stock_level: i64,
    },

    #[serde(rename = "InventoryOutOfStock", rename_all = "camelCase")]
    InventoryOutOfStock {
        inventory_item_id: InventoryItemId,
        sku: Sku,
        warehouse_id: WarehouseId,
    },
}

impl InventoryNotification {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            InventoryNotification::InventoryRestocked { .. } => "InventoryRestocked",
            InventoryNotification::LowStockAlert { .. } => "LowStockAlert",
            InventoryNotification::InventoryOutOfStock { .. } => "InventoryOutOfStock",
        }
    }

    pub fn inventory_item_id(&self) -> InventoryItemId {
        match self {
            InventoryNotification::InventoryRestocked {
                inventory_item_id, ..
            }
            | InventoryNotification::LowStockAlert {
                inventory_item_id, ..
            }
            | InventoryNotification::InventoryOutOfStock {
                inventory_item_id, ..
            } => *inventory_item_id,
        }
    }

    /// Notifications caused by moving an item from `before` to `after`.
    ///
    /// Alerts fire only when available stock crosses a boundary, so an item
    /// that stays low does not alert on every movement.
    pub fn for_change(
        before: &InventoryItem,
        after: &InventoryItem,
        transaction: &StockTransaction,
    ) -> Vec<InventoryNotification> {
        let mut notifications = Vec::new();
        let was = before.quantity_available();
        let now = after.quantity_available();

        if matches!(
            transaction.transaction_type,
            TransactionType::Receipt | TransactionType::Return | TransactionType::TransferIn
        ) {
            notifications.push(InventoryNotification::InventoryRestocked {
                inventory_item_id: after.id,
                sku: after.sku.clone(),
                warehouse_id: after.warehouse_id,
                quantity_added: transaction.quantity,
                quantity_available: now,
            });
        }

        if now <= 0 && was > 0 {
            notifications.push(InventoryNotification::InventoryOutOfStock {
                inventory_item_id: after.id,
                sku: after.sku.clone(),
                warehouse_id: after.warehouse_id,
            });
        } else if now <= after.reorder_threshold && was > after.reorder_threshold {
            notifications.push(InventoryNotification::LowStockAlert {
                inventory_item_id: after.id,
                sku: after.sku.clone(),
                warehouse_id: after.warehouse_id,
                quantity_available: now,
                reorder_threshold: after.reorder_threshold,
                target_stock_level: after.target_stock_level,
            });
        }

        notifications
    }
}

/// A notification waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: MessageId,
    pub notification: InventoryNotification,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn new(notification: InventoryNotification, now: DateTime<Utc>) -> Self {
        Self {
            id: MessageId::new(),
            notification,
            attempts: 0,
            last_error: None,
            created_at: now,
            dispatched_at: None,
        }
    }
}
