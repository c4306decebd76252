//! PostgreSQL repository integration tests
//!
//! These tests share one PostgreSQL container and need Docker. Run with:
//!
//! ```bash
//! cargo test -p inventory --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;

use inventory::{
    AddStock, Address, AllocationEngine, AllocationFilter, AllocationStatus, Capacity,
    CreateAllocation, FulfillAllocation,
    InventoryConfig, InventoryError, InventoryItemStore, InventoryRepository, NewItem,
    NewWarehouse, PostgresInventoryRepository, RecordCycleCount,
};
use common::{OrderId, OrderItemId};
use serial_test::serial;
use sqlx::PgPool;
use stock_ledger::{Reference, StockLedgerExt, TransactionQuery, TransactionType};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            stock_ledger::postgres::run_migrations(&temp_pool).await.unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> InventoryItemStore<PostgresInventoryRepository> {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE outbox, allocations, stock_transactions, item_locations, \
         inventory_items, locations, zones, warehouses",
    )
    .execute(&pool)
    .await
    .unwrap();

    let config = InventoryConfig {
        max_conflict_retries: 200,
        ..Default::default()
    };
    InventoryItemStore::new(Arc::new(PostgresInventoryRepository::new(pool)), config)
}

fn address() -> Address {
    Address {
        line1: "1 Dock Road".to_string(),
        city: "Rotterdam".to_string(),
        postal_code: "3011".to_string(),
        country: "NL".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn stock_round_trips_through_postgres() {
    let store = get_test_store().await;
    let registered = store
        .registry()
        .register_warehouse(NewWarehouse::new("Port", "PORT", address()))
        .await
        .unwrap();
    let item = store
        .create_item(NewItem::new("SKU-PG", "P-PG", registered.warehouse.id).category("bulk"))
        .await
        .unwrap();

    let reference = Reference::new("PO", "PO-1");
    store
        .add_stock(item.id, AddStock::new(25).reference(reference.clone()))
        .await
        .unwrap();
    let replay = store
        .add_stock(item.id, AddStock::new(25).reference(reference))
        .await
        .unwrap();
    assert!(replay.replayed);

    store
        .record_cycle_count(item.id, RecordCycleCount::new(22))
        .await
        .unwrap();

    let stored = store.get_item(item.id).await.unwrap();
    assert_eq!(stored.quantity_on_hand, 22);
    assert_eq!(stored.quantity_at(registered.location.id), 22);
    assert_eq!(stored.category.as_deref(), Some("bulk"));

    let transactions = store
        .transactions(TransactionQuery::for_item(item.id))
        .await
        .unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[1].transaction_type, TransactionType::CycleCount);
    assert!(store.reconcile(item.id).await.unwrap().consistent);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn allocation_lifecycle_in_postgres() {
    let store = get_test_store().await;
    let engine = AllocationEngine::new(store.clone());
    let registered = store
        .registry()
        .register_warehouse(NewWarehouse::new("Port", "PORT", address()))
        .await
        .unwrap();
    let item = store
        .create_item(NewItem::new("SKU-PG", "P-PG", registered.warehouse.id))
        .await
        .unwrap();
    store.add_stock(item.id, AddStock::new(100)).await.unwrap();

    let created = engine
        .create_allocation(CreateAllocation::new(
            OrderId::new(),
            OrderItemId::new(),
            item.id,
            30,
        ))
        .await
        .unwrap();
    engine.confirm(created.allocation.id).await.unwrap();
    let fulfilled = engine
        .fulfill(created.allocation.id, FulfillAllocation::new())
        .await
        .unwrap();

    assert_eq!(fulfilled.allocation.status, AllocationStatus::Fulfilled);
    assert_eq!(fulfilled.inventory_item.quantity_on_hand, 70);
    assert_eq!(fulfilled.inventory_item.quantity_reserved, 0);

    let pending = store
        .repository()
        .pending_outbox(10, 5)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].notification.event_type(), "InventoryRestocked");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_reservations_in_postgres() {
    let store = get_test_store().await;
    let registered = store
        .registry()
        .register_warehouse(NewWarehouse::new("Port", "PORT", address()))
        .await
        .unwrap();
    let item = store
        .create_item(NewItem::new("SKU-PG", "P-PG", registered.warehouse.id))
        .await
        .unwrap();
    store.add_stock(item.id, AddStock::new(10)).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.reserve(item.id, 1, None).await })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => admitted += 1,
            Err(InventoryError::InsufficientStock { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(admitted, 10);

    let replay = store
        .repository()
        .ledger()
        .replay_item(item.id)
        .await
        .unwrap();
    assert_eq!(replay.reserved(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires Docker"]
async fn identical_allocations_in_postgres_reserve_once() {
    let store = get_test_store().await;
    let engine = AllocationEngine::new(store.clone());
    let registered = store
        .registry()
        .register_warehouse(NewWarehouse::new("Port", "PORT", address()))
        .await
        .unwrap();
    let item = store
        .create_item(NewItem::new("SKU-PG", "P-PG", registered.warehouse.id))
        .await
        .unwrap();
    store.add_stock(item.id, AddStock::new(100)).await.unwrap();

    let request = CreateAllocation::new(OrderId::new(), OrderItemId::new(), item.id, 5);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let request = request.clone();
            tokio::spawn(async move { engine.create_allocation(request).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let for_order = engine
        .list_allocations(&AllocationFilter::new().order(request.order_id))
        .await
        .unwrap();
    assert_eq!(for_order.len(), 1);
    assert_eq!(store.get_item(item.id).await.unwrap().quantity_reserved, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires Docker"]
async fn location_limit_holds_under_concurrent_puts_in_postgres() {
    let store = get_test_store().await;
    let registered = store
        .registry()
        .register_warehouse(NewWarehouse::new("Port", "PORT", address()))
        .await
        .unwrap();
    let bin = store
        .registry()
        .add_location(registered.zone.id, "SMALL", Capacity::items(10))
        .await
        .unwrap();
    let mut items = Vec::new();
    for n in 0..8 {
        items.push(
            store
                .create_item(NewItem::new(format!("SKU-{n}"), "P-PG", registered.warehouse.id))
                .await
                .unwrap(),
        );
    }

    let handles: Vec<_> = items
        .iter()
        .map(|item| {
            let store = store.clone();
            let item_id = item.id;
            let bin_id = bin.id;
            tokio::spawn(async move { store.add_stock(item_id, AddStock::new(10).at(bin_id)).await })
        })
        .collect();

    let mut stocked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => stocked += 1,
            Err(InventoryError::LocationCapacityExceeded { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(stocked, 1);
    assert_eq!(store.repository().location_occupancy(bin.id).await.unwrap(), 10);
}
