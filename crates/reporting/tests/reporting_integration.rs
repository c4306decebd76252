//! Integration tests: stock operations through the item store → reports.

use std::sync::Arc;

use chrono::{Duration, Utc};
use inventory::{
    AddStock, Address, CommitSale, InMemoryInventoryRepository, InventoryConfig, InventoryItem,
    InventoryItemStore, NewItem, NewWarehouse, RegisteredWarehouse,
};
use reporting::{
    Bucket, LowStockQuery, MovementQuery, ReportError, ReportingAggregator, TurnoverQuery,
    ValueGrouping, ValueQuery,
};

type Repo = InMemoryInventoryRepository;

/// Helper to set up a store, a warehouse and the aggregator.
async fn setup() -> (InventoryItemStore<Repo>, ReportingAggregator<Repo>, RegisteredWarehouse) {
    let repo = Arc::new(InMemoryInventoryRepository::new());
    let store = InventoryItemStore::new(Arc::clone(&repo), InventoryConfig::default());
    let reports = ReportingAggregator::new(repo);
    let warehouse = store
        .registry()
        .register_warehouse(NewWarehouse::new(
            "Central",
            "CTR",
            Address {
                line1: "9 Mill Lane".to_string(),
                city: "York".to_string(),
                postal_code: "YO1".to_string(),
                country: "GB".to_string(),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    (store, reports, warehouse)
}

async fn stocked(
    store: &InventoryItemStore<Repo>,
    warehouse: &RegisteredWarehouse,
    sku: &str,
    category: &str,
    on_hand: i64,
) -> InventoryItem {
    let item = store
        .create_item(
            NewItem::new(sku, format!("P-{sku}"), warehouse.warehouse.id)
                .thresholds(5, 20)
                .unit_cost_cents(250)
                .category(category),
        )
        .await
        .unwrap();
    if on_hand == 0 {
        return item;
    }
    store
        .add_stock(item.id, AddStock::new(on_hand))
        .await
        .unwrap()
        .item
}

#[tokio::test]
async fn low_stock_lists_items_at_reorder_point() {
    let (store, reports, warehouse) = setup().await;
    let low = stocked(&store, &warehouse, "LOW", "tools", 3).await;
    stocked(&store, &warehouse, "PLENTY", "tools", 50).await;
    let empty = stocked(&store, &warehouse, "EMPTY", "tools", 0).await;

    let report = reports.low_stock(&LowStockQuery::default()).await.unwrap();

    assert_eq!(report.summary.item_count, 2);
    assert_eq!(report.summary.out_of_stock_count, 1);
    assert_eq!(report.items[0].inventory_item_id, empty.id);
    assert_eq!(report.items[1].inventory_item_id, low.id);
    assert_eq!(report.items[1].suggested_reorder_quantity, 17);
    assert_eq!(report.summary.total_suggested_reorder_quantity, 37);
}

#[tokio::test]
async fn low_stock_by_percentage_of_target() {
    let (store, reports, warehouse) = setup().await;
    stocked(&store, &warehouse, "A", "tools", 6).await;
    stocked(&store, &warehouse, "B", "tools", 9).await;

    // 40% of a target of 20 is 8.
    let query = LowStockQuery {
        warehouse_id: Some(warehouse.warehouse.id),
        threshold_percentage: Some(40.0),
    };
    let report = reports.low_stock(&query).await.unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].sku.as_str(), "A");
}

#[tokio::test]
async fn reserved_stock_counts_against_availability() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 12).await;
    store.reserve(item.id, 10, None).await.unwrap();

    let report = reports.low_stock(&LowStockQuery::default()).await.unwrap();
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.items[0].quantity_available, 2);
    assert_eq!(report.items[0].suggested_reorder_quantity, 18);
}

#[tokio::test]
async fn inventory_value_groups_by_category() {
    let (store, reports, warehouse) = setup().await;
    stocked(&store, &warehouse, "A", "tools", 10).await;
    stocked(&store, &warehouse, "B", "tools", 4).await;
    stocked(&store, &warehouse, "C", "paint", 2).await;

    let report = reports
        .inventory_value(&ValueQuery {
            group_by: ValueGrouping::Category,
            warehouse_id: None,
        })
        .await
        .unwrap();

    assert_eq!(report.groups.len(), 2);
    assert_eq!(report.groups[0].key, "paint");
    assert_eq!(report.groups[0].value_cents, 500);
    assert_eq!(report.groups[1].key, "tools");
    assert_eq!(report.groups[1].item_count, 2);
    assert_eq!(report.groups[1].value_cents, 3500);
    assert_eq!(report.total_value_cents, 4000);

    let by_warehouse = reports.inventory_value(&ValueQuery::default()).await.unwrap();
    assert_eq!(by_warehouse.groups.len(), 1);
    assert_eq!(by_warehouse.groups[0].key, warehouse.warehouse.id.to_string());
}

#[tokio::test]
async fn movements_are_summed_per_type() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 10).await;
    store.add_stock(item.id, AddStock::new(5)).await.unwrap();
    store.reserve(item.id, 4, None).await.unwrap();
    store
        .commit_sale(item.id, CommitSale::new(3))
        .await
        .unwrap();

    let now = Utc::now();
    let series = reports
        .stock_movements(&MovementQuery {
            inventory_item_id: Some(item.id),
            warehouse_id: None,
            from: now - Duration::days(2),
            to: now + Duration::minutes(1),
            bucket: Bucket::Week,
        })
        .await
        .unwrap();

    let transactions: usize = series.buckets.iter().map(|b| b.transaction_count).sum();
    assert_eq!(transactions, 4);
    let received: i64 = series
        .buckets
        .iter()
        .filter_map(|b| b.quantities.get("RECEIPT"))
        .sum();
    assert_eq!(received, 15);
    let net: i64 = series.buckets.iter().map(|b| b.net_on_hand_change).sum();
    assert_eq!(net, 12);
}

#[tokio::test]
async fn turnover_counts_sales_at_cost() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 20).await;
    store.reserve(item.id, 8, None).await.unwrap();
    store
        .commit_sale(item.id, CommitSale::new(8))
        .await
        .unwrap();

    let now = Utc::now();
    let report = reports
        .turnover(&TurnoverQuery {
            inventory_item_id: Some(item.id),
            warehouse_id: None,
            from: now - Duration::hours(1),
            to: now + Duration::hours(1),
        })
        .await
        .unwrap();

    assert_eq!(report.items_considered, 1);
    assert_eq!(report.units_sold, 8);
    assert_eq!(report.cost_of_goods_moved_cents, 2000);
    assert!(report.average_inventory_value_cents > 0.0);
    assert!(report.turnover_ratio.is_some());
}

#[tokio::test]
async fn never_stocked_item_is_out_of_stock() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 0).await;

    let now = Utc::now();
    let report = reports
        .stockouts(item.id, now - Duration::hours(1), now + Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(report.stockout_count, 1);
    assert!(report.intervals[0].ongoing);
}

#[tokio::test]
async fn history_replays_every_step() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 10).await;
    store.reserve(item.id, 3, None).await.unwrap();

    let history = reports.item_history(item.id).await.unwrap();
    assert_eq!(history.points.len(), 2);
    assert_eq!(history.points[1].available, 7);
    assert!(history.reconciliation.consistent);
}

#[tokio::test]
async fn inverted_window_is_rejected() {
    let (store, reports, warehouse) = setup().await;
    let item = stocked(&store, &warehouse, "A", "tools", 1).await;

    let now = Utc::now();
    let result = reports.stockouts(item.id, now, now - Duration::hours(1)).await;
    assert!(matches!(result, Err(ReportError::Validation(_))));
}
