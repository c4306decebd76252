//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use inventory::{InMemoryInventoryRepository, InventoryConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const ADMIN: &str = "inventory-admin";
const VIEWER: &str = "inventory-viewer";
const ORDERS: &str = "order-service";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    let repo = Arc::new(InMemoryInventoryRepository::new());
    let state = api::create_state(repo, InventoryConfig::default());
    api::create_app(state, get_metrics_handle())
}

/// Sends one request and returns the status and parsed JSON body.
async fn send(
    app: &axum::Router,
    method: &str,
    path: &str,
    role: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(role) = role {
        builder = builder
            .header("x-principal-id", format!("{role}-1"))
            .header("x-principal-role", role);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn v1(path: &str) -> String {
    format!("/inventory/v1{path}")
}

/// Registers a warehouse and returns its id.
async fn warehouse(app: &axum::Router, code: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        &v1("/warehouses"),
        Some(ADMIN),
        Some(json!({
            "name": format!("Warehouse {code}"),
            "code": code,
            "address": {
                "line1": "1 Dock Road",
                "city": "Antwerp",
                "postalCode": "2000",
                "country": "BE"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["warehouse"]["id"].as_str().unwrap().to_string()
}

/// Creates an item with `on_hand` units and returns its id.
async fn stocked_item(app: &axum::Router, warehouse_id: &str, on_hand: i64) -> String {
    let (status, body) = send(
        app,
        "POST",
        &v1("/inventory-items"),
        Some(ADMIN),
        Some(json!({
            "sku": "SKU-API",
            "productId": "PROD-API",
            "warehouseId": warehouse_id,
            "reorderThreshold": 10,
            "targetStockLevel": 100,
            "unitCostCents": 120
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    if on_hand > 0 {
        let (status, body) = send(
            app,
            "POST",
            &v1(&format!("/inventory-items/{id}/add-stock")),
            Some(ADMIN),
            Some(json!({ "quantity": on_hand })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    id
}

fn allocation_request(item_id: &str, quantity: i64) -> Value {
    json!({
        "orderId": uuid(),
        "orderItemId": uuid(),
        "inventoryItemId": item_id,
        "quantity": quantity
    })
}

fn uuid() -> String {
    common::OrderId::new().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();
    let (status, body) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_role_is_forbidden() {
    let app = setup();
    let (status, body) = send(&app, "GET", &v1("/warehouses"), None, None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_unknown_role_is_forbidden() {
    let app = setup();
    let (status, body) = send(&app, "GET", &v1("/warehouses"), Some("intern"), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_viewer_can_read_but_not_write() {
    let app = setup();
    let wh = warehouse(&app, "RD1").await;
    let item = stocked_item(&app, &wh, 5).await;

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/inventory-items/{item}")),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["quantityOnHand"], 5);

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/add-stock")),
        Some(VIEWER),
        Some(json!({ "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_add_stock_reports_quantities() {
    let app = setup();
    let wh = warehouse(&app, "ADD").await;
    let item = stocked_item(&app, &wh, 20).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/add-stock")),
        Some(ADMIN),
        Some(json!({
            "quantity": 30,
            "referenceType": "PURCHASE_ORDER",
            "referenceNumber": "PO-1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["previousQuantity"], 20);
    assert_eq!(body["data"]["newQuantity"], 50);
    assert_eq!(body["data"]["transaction"]["type"], "RECEIPT");
    assert_eq!(body["data"]["transaction"]["referenceNumber"], "PO-1");
    assert_eq!(body["data"]["replayed"], false);
}

#[tokio::test]
async fn test_adjust_stock_requires_reason() {
    let app = setup();
    let wh = warehouse(&app, "ADJ").await;
    let item = stocked_item(&app, &wh, 20).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/adjust-stock")),
        Some(ADMIN),
        Some(json!({ "quantity": -3 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_allocation_lifecycle() {
    let app = setup();
    let wh = warehouse(&app, "ALC").await;
    let item = stocked_item(&app, &wh, 50).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1("/allocations"),
        Some(ORDERS),
        Some(allocation_request(&item, 5)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["allocation"]["status"], "PENDING");
    assert_eq!(body["data"]["inventoryItem"]["quantityReserved"], 5);
    let allocation = body["data"]["allocation"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PUT",
        &v1(&format!("/allocations/{allocation}/confirm")),
        Some(ORDERS),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CONFIRMED");

    let (status, body) = send(
        &app,
        "PUT",
        &v1(&format!("/allocations/{allocation}/fulfill")),
        Some(ORDERS),
        Some(json!({ "referenceNumber": "SHP-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["allocation"]["status"], "FULFILLED");
    assert_eq!(body["data"]["transaction"]["type"], "SALE");
    assert_eq!(body["data"]["inventoryItem"]["quantityOnHand"], 45);
    assert_eq!(body["data"]["inventoryItem"]["quantityReserved"], 0);

    // Terminal allocations reject further transitions.
    let (status, body) = send(
        &app,
        "PUT",
        &v1(&format!("/allocations/{allocation}/cancel")),
        Some(ORDERS),
        Some(json!({ "reason": "customer changed mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATUS_TRANSITION");
}

#[tokio::test]
async fn test_allocation_beyond_available_is_conflict() {
    let app = setup();
    let wh = warehouse(&app, "INS").await;
    let item = stocked_item(&app, &wh, 3).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1("/allocations"),
        Some(ORDERS),
        Some(allocation_request(&item, 5)),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INSUFFICIENT_STOCK");
    assert_eq!(body["error"]["details"]["requested"], 5);
    assert_eq!(body["error"]["details"]["available"], 3);
}

#[tokio::test]
async fn test_cancel_requires_reason() {
    let app = setup();
    let wh = warehouse(&app, "CNL").await;
    let item = stocked_item(&app, &wh, 10).await;
    let (_, body) = send(
        &app,
        "POST",
        &v1("/allocations"),
        Some(ORDERS),
        Some(allocation_request(&item, 2)),
    )
    .await;
    let allocation = body["data"]["allocation"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "PUT",
        &v1(&format!("/allocations/{allocation}/cancel")),
        Some(ORDERS),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        "PUT",
        &v1(&format!("/allocations/{allocation}/cancel")),
        Some(ORDERS),
        Some(json!({ "reason": "order cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allocation"]["status"], "CANCELLED");
    assert_eq!(body["data"]["inventoryItem"]["quantityReserved"], 0);
}

#[tokio::test]
async fn test_unknown_allocation_is_not_found() {
    let app = setup();
    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/allocations/{}", uuid())),
        Some(VIEWER),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "ALLOCATION_NOT_FOUND");
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = setup();
    let (status, body) = send(
        &app,
        "POST",
        &v1("/allocations"),
        Some(ORDERS),
        Some(json!({ "quantity": "lots" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_invalid_path_id_is_bad_request() {
    let app = setup();
    let (status, body) = send(
        &app,
        "GET",
        &v1("/inventory-items/not-a-uuid"),
        Some(VIEWER),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_bulk_allocation_partial_success() {
    let app = setup();
    let wh = warehouse(&app, "BLK").await;
    let item = stocked_item(&app, &wh, 10).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1("/allocations/bulk"),
        Some(ORDERS),
        Some(json!({
            "allocations": [
                allocation_request(&item, 6),
                allocation_request(&item, 6),
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["successfulAllocations"].as_array().unwrap().len(), 1);
    let failed = body["data"]["failedAllocations"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["index"], 1);
    assert_eq!(failed[0]["code"], "INSUFFICIENT_STOCK");
}

#[tokio::test]
async fn test_transfer_between_warehouses() {
    let app = setup();
    let source = warehouse(&app, "SRC").await;
    let destination = warehouse(&app, "DST").await;
    let item = stocked_item(&app, &source, 40).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/transfer")),
        Some(ADMIN),
        Some(json!({
            "quantity": 15,
            "sourceWarehouseId": source,
            "destinationWarehouseId": destination
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let data = &body["data"];
    assert_eq!(data["sourceItem"]["quantityOnHand"], 25);
    assert_eq!(data["destinationItem"]["quantityOnHand"], 15);
    assert_eq!(data["outboundTransaction"]["type"], "TRANSFER_OUT");
    assert_eq!(data["inboundTransaction"]["type"], "TRANSFER_IN");
    assert_eq!(
        data["outboundTransaction"]["relatedTransactionId"],
        data["inboundTransaction"]["id"]
    );
}

#[tokio::test]
async fn test_transfer_to_same_warehouse_is_rejected() {
    let app = setup();
    let wh = warehouse(&app, "SAME").await;
    let item = stocked_item(&app, &wh, 10).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/transfer")),
        Some(ADMIN),
        Some(json!({
            "quantity": 1,
            "sourceWarehouseId": wh,
            "destinationWarehouseId": wh
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_transfer_into_full_location_is_compensated() {
    let app = setup();
    let source = warehouse(&app, "CSRC").await;
    let destination = warehouse(&app, "CDST").await;
    let item = stocked_item(&app, &source, 40).await;

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/warehouses/{destination}/zones")),
        Some(ADMIN),
        Some(json!({ "name": "Overflow", "capacity": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let zone = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/zones/{zone}/locations")),
        Some(ADMIN),
        Some(json!({ "code": "TINY-01", "capacity": { "maxItems": 5 } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let location = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/transfer")),
        Some(ADMIN),
        Some(json!({
            "quantity": 10,
            "sourceWarehouseId": source,
            "destinationWarehouseId": destination,
            "destinationLocationId": location
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "TRANSFER_COMPENSATED");
    let details = &body["error"]["details"];
    assert_eq!(details["cause"]["code"], "LOCATION_CAPACITY_EXCEEDED");
    assert_eq!(details["quantity"], 10);
    assert!(details["compensatingTransactionId"].is_string());

    // The debit was credited back.
    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/inventory-items/{item}")),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantityOnHand"], 40);

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/locations/{location}/capacity")),
        Some(ADMIN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["occupiedItems"], 0);
    assert_eq!(body["data"]["remainingItems"], 5);
}

#[tokio::test]
async fn test_transactions_and_reconcile() {
    let app = setup();
    let wh = warehouse(&app, "LED").await;
    let item = stocked_item(&app, &wh, 10).await;
    send(
        &app,
        "POST",
        &v1(&format!("/inventory-items/{item}/adjust-stock")),
        Some(ADMIN),
        Some(json!({ "quantity": -2, "reason": "broken in handling" })),
    )
    .await;

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/inventory-items/{item}/transactions")),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let transactions = body["data"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[1]["type"], "ADJUSTMENT");

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/inventory-items/{item}/transactions?type=RECEIPT")),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/inventory-items/{item}/reconcile")),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["consistent"], true);
    assert_eq!(body["data"]["replayedOnHand"], 8);
}

#[tokio::test]
async fn test_low_stock_report() {
    let app = setup();
    let wh = warehouse(&app, "LOW").await;
    stocked_item(&app, &wh, 8).await;

    let (status, body) = send(
        &app,
        "GET",
        &v1(&format!("/reports/low-stock?warehouseId={wh}")),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["summary"]["itemCount"], 1);
    assert_eq!(body["data"]["items"][0]["suggestedReorderQuantity"], 92);

    // 5% of a target of 100 is 5, below the 8 available.
    let (status, body) = send(
        &app,
        "GET",
        &v1("/reports/low-stock?thresholdPercentage=5"),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["summary"]["itemCount"], 0);

    let (status, body) = send(
        &app,
        "GET",
        &v1("/reports/low-stock?thresholdPercentage=250"),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_inventory_value_report() {
    let app = setup();
    let wh = warehouse(&app, "VAL").await;
    stocked_item(&app, &wh, 10).await;

    let (status, body) = send(
        &app,
        "GET",
        &v1("/reports/inventory-value?groupBy=warehouse"),
        Some(VIEWER),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["totalValueCents"], 1200);
    assert_eq!(body["data"]["groups"][0]["key"], wh);
}

#[tokio::test]
async fn test_duplicate_warehouse_code_is_conflict() {
    let app = setup();
    warehouse(&app, "DUP").await;

    let (status, body) = send(
        &app,
        "POST",
        &v1("/warehouses"),
        Some(ADMIN),
        Some(json!({
            "name": "Again",
            "code": "dup",
            "address": {
                "line1": "2 Dock Road",
                "city": "Antwerp",
                "postalCode": "2000",
                "country": "BE"
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_WAREHOUSE_CODE");
}
