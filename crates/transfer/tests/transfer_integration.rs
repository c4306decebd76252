//! Integration tests for inter-warehouse transfers.

use std::sync::Arc;

use inventory::{
    AddStock, Address, Capacity, InMemoryInventoryRepository, InventoryConfig, InventoryError,
    InventoryItem, InventoryItemStore, NewItem, NewWarehouse, RegisteredWarehouse,
};
use stock_ledger::{Reference, TransactionQuery, TransactionType};
use transfer::{TransferCoordinator, TransferError, TransferRequest};

type Repo = InMemoryInventoryRepository;

struct TestHarness {
    store: InventoryItemStore<Repo>,
    coordinator: TransferCoordinator<Repo>,
    source: RegisteredWarehouse,
    destination: RegisteredWarehouse,
}

fn address(city: &str) -> Address {
    Address {
        line1: "12 Canal Side".to_string(),
        city: city.to_string(),
        postal_code: "0000".to_string(),
        country: "NL".to_string(),
        ..Default::default()
    }
}

impl TestHarness {
    async fn new() -> Self {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let config = InventoryConfig {
            max_conflict_retries: 1000,
            ..Default::default()
        };
        let store = InventoryItemStore::new(repo, config);
        let coordinator = TransferCoordinator::new(store.clone());
        let source = store
            .registry()
            .register_warehouse(NewWarehouse::new("North", "NORTH", address("Groningen")))
            .await
            .unwrap();
        let destination = store
            .registry()
            .register_warehouse(NewWarehouse::new("South", "SOUTH", address("Maastricht")))
            .await
            .unwrap();
        Self {
            store,
            coordinator,
            source,
            destination,
        }
    }

    async fn source_item(&self, on_hand: i64) -> InventoryItem {
        let item = self
            .store
            .create_item(
                NewItem::new("SKU-T", "P-T", self.source.warehouse.id)
                    .thresholds(5, 40)
                    .category("fasteners"),
            )
            .await
            .unwrap();
        self.store
            .add_stock(item.id, AddStock::new(on_hand))
            .await
            .unwrap()
            .item
    }

    fn request(&self, quantity: i64) -> TransferRequest {
        TransferRequest::new(
            quantity,
            self.source.warehouse.id,
            self.destination.warehouse.id,
        )
    }
}

#[tokio::test]
async fn transfer_moves_stock_and_links_legs() {
    let h = TestHarness::new().await;
    let item = h.source_item(50).await;

    let outcome = h
        .coordinator
        .transfer(item.id, h.request(10))
        .await
        .unwrap();

    assert_eq!(outcome.source_item.quantity_on_hand, 40);
    assert_eq!(outcome.destination_item.quantity_on_hand, 10);
    assert_eq!(outcome.destination_item.sku, item.sku);
    assert_eq!(outcome.destination_item.warehouse_id, h.destination.warehouse.id);
    assert_eq!(outcome.destination_item.category.as_deref(), Some("fasteners"));
    assert_eq!(
        outcome.destination_item.quantity_at(h.destination.location.id),
        10
    );

    let out = &outcome.outbound_transaction;
    let inbound = &outcome.inbound_transaction;
    assert_eq!(out.transaction_type, TransactionType::TransferOut);
    assert_eq!(out.quantity, -10);
    assert_eq!(inbound.transaction_type, TransactionType::TransferIn);
    assert_eq!(inbound.quantity, 10);
    assert_eq!(out.related_transaction_id, Some(inbound.id));
    assert_eq!(inbound.related_transaction_id, Some(out.id));

    assert!(h.store.reconcile(item.id).await.unwrap().consistent);
    assert!(
        h.store
            .reconcile(outcome.destination_item.id)
            .await
            .unwrap()
            .consistent
    );
}

#[tokio::test]
async fn transfer_into_existing_item_adds_to_it() {
    let h = TestHarness::new().await;
    let item = h.source_item(50).await;

    let first = h.coordinator.transfer(item.id, h.request(10)).await.unwrap();
    let second = h.coordinator.transfer(item.id, h.request(5)).await.unwrap();

    assert_eq!(first.destination_item.id, second.destination_item.id);
    assert_eq!(second.destination_item.quantity_on_hand, 15);
    assert_eq!(second.source_item.quantity_on_hand, 35);
}

#[tokio::test]
async fn failed_credit_is_compensated() {
    let h = TestHarness::new().await;
    let item = h.source_item(50).await;
    let small = h
        .store
        .registry()
        .add_location(h.destination.zone.id, "SMALL", Capacity::items(5))
        .await
        .unwrap();

    let result = h
        .coordinator
        .transfer(item.id, h.request(10).to_location(small.id))
        .await;

    let Err(TransferError::Compensated {
        source_item_id,
        quantity,
        cause,
        compensating_transaction,
        ..
    }) = result
    else {
        panic!("expected a compensated transfer, got {result:?}");
    };
    assert_eq!(source_item_id, item.id);
    assert_eq!(quantity, 10);
    assert!(matches!(
        cause,
        InventoryError::LocationCapacityExceeded { .. }
    ));
    assert_eq!(
        compensating_transaction.transaction_type,
        TransactionType::Adjustment
    );
    assert_eq!(compensating_transaction.quantity, 10);

    let source = h.store.get_item(item.id).await.unwrap();
    assert_eq!(source.quantity_on_hand, 50);

    let outbound = h
        .store
        .transactions(
            TransactionQuery::for_item(item.id).transaction_type(TransactionType::TransferOut),
        )
        .await
        .unwrap();
    assert_eq!(outbound.len(), 1);
    assert_eq!(
        outbound[0].related_transaction_id,
        Some(compensating_transaction.id)
    );
    assert_eq!(
        compensating_transaction.related_transaction_id,
        Some(outbound[0].id)
    );
    assert!(h.store.reconcile(item.id).await.unwrap().consistent);
}

#[tokio::test]
async fn inactive_destination_item_is_compensated() {
    let h = TestHarness::new().await;
    let item = h.source_item(20).await;
    let retired = h
        .store
        .create_item(NewItem::new("SKU-T", "P-T", h.destination.warehouse.id))
        .await
        .unwrap();
    h.store.deactivate_item(retired.id).await.unwrap();

    let result = h.coordinator.transfer(item.id, h.request(8)).await;

    let err = result.unwrap_err();
    assert_eq!(err.code(), "TRANSFER_COMPENSATED");
    assert_eq!(err.details()["cause"]["code"], "INVENTORY_ITEM_NOT_FOUND");
    assert_eq!(h.store.get_item(item.id).await.unwrap().quantity_on_hand, 20);
}

#[tokio::test]
async fn insufficient_stock_moves_nothing() {
    let h = TestHarness::new().await;
    let item = h.source_item(5).await;

    let result = h.coordinator.transfer(item.id, h.request(10)).await;
    assert!(matches!(
        result,
        Err(TransferError::Inventory(InventoryError::InsufficientStock {
            requested: 10,
            available: 5,
            ..
        }))
    ));

    let ledger = h
        .store
        .transactions(TransactionQuery::for_item(item.id))
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert!(
        h.store
            .find_item(&item.sku, h.destination.warehouse.id)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn reserved_stock_cannot_be_transferred() {
    let h = TestHarness::new().await;
    let item = h.source_item(10).await;
    h.store.reserve(item.id, 8, None).await.unwrap();

    let result = h.coordinator.transfer(item.id, h.request(3)).await;
    assert!(matches!(
        result,
        Err(TransferError::Inventory(InventoryError::InsufficientStock {
            available: 2,
            ..
        }))
    ));
}

#[tokio::test]
async fn same_warehouse_is_rejected() {
    let h = TestHarness::new().await;
    let item = h.source_item(10).await;

    let request = TransferRequest::new(3, h.source.warehouse.id, h.source.warehouse.id);
    let result = h.coordinator.transfer(item.id, request).await;
    assert!(matches!(result, Err(TransferError::Validation(_))));
}

#[tokio::test]
async fn item_must_be_stocked_in_source_warehouse() {
    let h = TestHarness::new().await;
    let item = h.source_item(10).await;

    let request = TransferRequest::new(3, h.destination.warehouse.id, h.source.warehouse.id);
    let result = h.coordinator.transfer(item.id, request).await;
    assert!(matches!(result, Err(TransferError::Validation(_))));
}

#[tokio::test]
async fn inactive_destination_warehouse_is_rejected() {
    let h = TestHarness::new().await;
    let item = h.source_item(10).await;
    h.store
        .registry()
        .deactivate_warehouse(h.destination.warehouse.id)
        .await
        .unwrap();

    let result = h.coordinator.transfer(item.id, h.request(3)).await;
    assert!(matches!(
        result,
        Err(TransferError::Inventory(InventoryError::WarehouseNotFound(_)))
    ));
    assert_eq!(h.store.get_item(item.id).await.unwrap().quantity_on_hand, 10);
}

#[tokio::test]
async fn retried_transfer_is_not_repeated() {
    let h = TestHarness::new().await;
    let item = h.source_item(30).await;
    let request = h.request(10).reference(Reference::new("TRANSFER_ORDER", "TO-9"));

    let first = h
        .coordinator
        .transfer(item.id, request.clone())
        .await
        .unwrap();
    let second = h.coordinator.transfer(item.id, request).await.unwrap();

    assert_eq!(first.outbound_transaction.id, second.outbound_transaction.id);
    assert_eq!(first.inbound_transaction.id, second.inbound_transaction.id);
    assert_eq!(second.source_item.quantity_on_hand, 20);
    assert_eq!(second.destination_item.quantity_on_hand, 10);
}

#[tokio::test]
async fn retried_compensated_transfer_stays_compensated() {
    let h = TestHarness::new().await;
    let item = h.source_item(30).await;
    let small = h
        .store
        .registry()
        .add_location(h.destination.zone.id, "SMALL", Capacity::items(5))
        .await
        .unwrap();
    let request = h
        .request(10)
        .to_location(small.id)
        .reference(Reference::new("TRANSFER_ORDER", "TO-10"));

    let first = h.coordinator.transfer(item.id, request.clone()).await;
    assert!(matches!(first, Err(TransferError::Compensated { .. })));

    let second = h.coordinator.transfer(item.id, request).await;
    assert!(matches!(second, Err(TransferError::Validation(_))));
    assert_eq!(h.store.get_item(item.id).await.unwrap().quantity_on_hand, 30);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_transfers_conserve_units() {
    let h = TestHarness::new().await;
    let item = h.source_item(10).await;

    let handles: Vec<_> = (0..15)
        .map(|_| {
            let coordinator = h.coordinator.clone();
            let request = h.request(1);
            tokio::spawn(async move { coordinator.transfer(item.id, request).await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(TransferError::Inventory(InventoryError::InsufficientStock { .. })) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(completed, 10);

    let source = h.store.get_item(item.id).await.unwrap();
    let destination = h
        .store
        .find_item(&item.sku, h.destination.warehouse.id)
        .await
        .unwrap();
    assert_eq!(source.quantity_on_hand, 0);
    assert_eq!(destination.quantity_on_hand, 10);
}
