use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    AllocationId, InventoryItemId, LocationId, MessageId, OrderId, OrderItemId, ProductId, Sku,
    WarehouseId, ZoneId,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use stock_ledger::{AppendOptions, PostgresStockLedger, Sequence};
use uuid::Uuid;

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

use super::{AllocationWrite, InventoryRepository, ItemWrite, Result, UnitOfWork};
use crate::allocation::{Allocation, AllocationFilter, AllocationStatus};
use crate::error::RepositoryError;
use crate::item::{InventoryItem, ItemAttributes, ItemFilter, LocationQuantity};
use crate::outbox::{InventoryNotification, OutboxMessage};
use crate::warehouse::{Address, Capacity, Location, Warehouse, WarehouseType, Zone};

const ITEM_COLUMNS: &str = "SELECT id, sku, product_id, warehouse_id, quantity_on_hand, \
     quantity_reserved, reorder_threshold, target_stock_level, unit_cost_cents, category, \
     attributes, is_active, ledger_sequence, version, created_at, updated_at FROM inventory_items";

const ALLOCATION_COLUMNS: &str = "SELECT id, order_id, order_item_id, inventory_item_id, \
     warehouse_id, quantity, status, expires_at, cancellation_reason, version, created_at, \
     updated_at FROM allocations";

const WAREHOUSE_COLUMNS: &str = "SELECT id, name, code, warehouse_type, address, is_active, \
     default_location_id, created_at, updated_at FROM warehouses";

const ZONE_COLUMNS: &str =
    "SELECT id, warehouse_id, name, max_weight, max_volume, max_items, created_at FROM zones";

const LOCATION_COLUMNS: &str = "SELECT id, warehouse_id, zone_id, code, max_weight, max_volume, \
     max_items, created_at FROM locations";

/// PostgreSQL-backed repository.
///
/// A commit runs in one database transaction: the item row is updated with
/// a compare-and-swap on `version` and its ledger entries are appended on the
/// same connection.
#[derive(Clone)]
pub struct PostgresInventoryRepository {
    pool: PgPool,
    ledger: PostgresStockLedger,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: PostgresStockLedger::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        stock_ledger::postgres::run_migrations(&self.pool).await?;
        Ok(())
    }

    async fn attach_locations(&self, items: &mut [InventoryItem]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = items.iter().map(|i| i.id.as_uuid()).collect();
        let rows = sqlx::query(
            "SELECT inventory_item_id, location_id, quantity FROM item_locations \
             WHERE inventory_item_id = ANY($1) ORDER BY position ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_item: HashMap<Uuid, Vec<LocationQuantity>> = HashMap::new();
        for row in rows {
            by_item
                .entry(row.try_get("inventory_item_id")?)
                .or_default()
                .push(LocationQuantity {
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    quantity: row.try_get("quantity")?,
                });
        }
        for item in items.iter_mut() {
            item.locations = by_item.remove(&item.id.as_uuid()).unwrap_or_default();
        }
        Ok(())
    }

    async fn fetch_items(&self, query: PgQuery<'_>) -> Result<Vec<InventoryItem>> {
        let rows = query.fetch_all(&self.pool).await?;
        let mut items = rows.iter().map(row_to_item).collect::<Result<Vec<_>>>()?;
        self.attach_locations(&mut items).await?;
        Ok(items)
    }
}

fn decode<T, E: std::fmt::Display>(value: std::result::Result<T, E>) -> Result<T> {
    value.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_capacity(row: &PgRow) -> Result<Capacity> {
    Ok(Capacity {
        max_weight: row.try_get("max_weight")?,
        max_volume: row.try_get("max_volume")?,
        max_items: row.try_get("max_items")?,
    })
}

fn row_to_warehouse(row: &PgRow) -> Result<Warehouse> {
    let warehouse_type: String = row.try_get("warehouse_type")?;
    let address: serde_json::Value = row.try_get("address")?;
    Ok(Warehouse {
        id: WarehouseId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        warehouse_type: decode(warehouse_type.parse::<WarehouseType>())?,
        address: serde_json::from_value::<Address>(address)?,
        is_active: row.try_get("is_active")?,
        default_location_id: LocationId::from_uuid(row.try_get("default_location_id")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_zone(row: &PgRow) -> Result<Zone> {
    Ok(Zone {
        id: ZoneId::from_uuid(row.try_get("id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id")?),
        name: row.try_get("name")?,
        capacity: row_to_capacity(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_location(row: &PgRow) -> Result<Location> {
    Ok(Location {
        id: LocationId::from_uuid(row.try_get("id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id")?),
        zone_id: ZoneId::from_uuid(row.try_get("zone_id")?),
        code: row.try_get("code")?,
        capacity: row_to_capacity(row)?,
        created_at: row.try_get("created_at")?,
    })
}

/// Decodes an `inventory_items` row; locations are attached separately.
fn row_to_item(row: &PgRow) -> Result<InventoryItem> {
    let attributes: serde_json::Value = row.try_get("attributes")?;
    Ok(InventoryItem {
        id: InventoryItemId::from_uuid(row.try_get("id")?),
        sku: Sku::new(row.try_get::<String, _>("sku")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id")?),
        quantity_on_hand: row.try_get("quantity_on_hand")?,
        quantity_reserved: row.try_get("quantity_reserved")?,
        reorder_threshold: row.try_get("reorder_threshold")?,
        target_stock_level: row.try_get("target_stock_level")?,
        unit_cost_cents: row.try_get("unit_cost_cents")?,
        category: row.try_get("category")?,
        attributes: serde_json::from_value::<ItemAttributes>(attributes)?,
        is_active: row.try_get("is_active")?,
        locations: Vec::new(),
        ledger_sequence: Sequence::new(row.try_get("ledger_sequence")?),
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_allocation(row: &PgRow) -> Result<Allocation> {
    let status: String = row.try_get("status")?;
    Ok(Allocation {
        id: AllocationId::from_uuid(row.try_get("id")?),
        order_id: OrderId::from_uuid(row.try_get("order_id")?),
        order_item_id: OrderItemId::from_uuid(row.try_get("order_item_id")?),
        inventory_item_id: InventoryItemId::from_uuid(row.try_get("inventory_item_id")?),
        warehouse_id: WarehouseId::from_uuid(row.try_get("warehouse_id")?),
        quantity: row.try_get("quantity")?,
        status: decode(status.parse::<AllocationStatus>())?,
        expires_at: row.try_get("expires_at")?,
        cancellation_reason: row.try_get("cancellation_reason")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_message(row: &PgRow) -> Result<OutboxMessage> {
    let payload: serde_json::Value = row.try_get("payload")?;
    Ok(OutboxMessage {
        id: MessageId::from_uuid(row.try_get("id")?),
        notification: serde_json::from_value::<InventoryNotification>(payload)?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        dispatched_at: row.try_get("dispatched_at")?,
    })
}

fn map_unique(
    e: sqlx::Error,
    on_violation: impl FnOnce(&str) -> Option<RepositoryError>,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
        && let Some(mapped) = on_violation(constraint)
    {
        return mapped;
    }
    RepositoryError::Database(e)
}

async fn insert_location_row(conn: &mut PgConnection, location: &Location) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO locations (id, warehouse_id, zone_id, code, max_weight, max_volume, max_items, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(location.id.as_uuid())
    .bind(location.warehouse_id.as_uuid())
    .bind(location.zone_id.as_uuid())
    .bind(&location.code)
    .bind(location.capacity.max_weight)
    .bind(location.capacity.max_volume)
    .bind(location.capacity.max_items)
    .bind(location.created_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        map_unique(e, |constraint| {
            (constraint == "unique_location_code")
                .then(|| RepositoryError::DuplicateLocationCode(location.code.clone()))
        })
    })?;
    Ok(())
}

async fn insert_zone_row(conn: &mut PgConnection, zone: &Zone) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO zones (id, warehouse_id, name, max_weight, max_volume, max_items, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(zone.id.as_uuid())
    .bind(zone.warehouse_id.as_uuid())
    .bind(&zone.name)
    .bind(zone.capacity.max_weight)
    .bind(zone.capacity.max_volume)
    .bind(zone.capacity.max_items)
    .bind(zone.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_item(conn: &mut PgConnection, write: &ItemWrite) -> Result<()> {
    let item = &write.item;
    let attributes = serde_json::to_value(&item.attributes)?;

    match write.expected_version {
        None => {
            sqlx::query(
                r#"
                INSERT INTO inventory_items (
                    id, sku, product_id, warehouse_id, quantity_on_hand, quantity_reserved,
                    reorder_threshold, target_stock_level, unit_cost_cents, category, attributes,
                    is_active, ledger_sequence, version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.sku.as_str())
            .bind(item.product_id.as_str())
            .bind(item.warehouse_id.as_uuid())
            .bind(item.quantity_on_hand)
            .bind(item.quantity_reserved)
            .bind(item.reorder_threshold)
            .bind(item.target_stock_level)
            .bind(item.unit_cost_cents)
            .bind(item.category.as_deref())
            .bind(&attributes)
            .bind(item.is_active)
            .bind(item.ledger_sequence.as_i64())
            .bind(item.version)
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                map_unique(e, |constraint| {
                    (constraint == "unique_item_sku_warehouse").then(|| {
                        RepositoryError::DuplicateItem {
                            sku: item.sku.clone(),
                            warehouse_id: item.warehouse_id,
                        }
                    })
                })
            })?;
            check_capacity(conn, item).await?;
        }
        Some(expected) => {
            let result = sqlx::query(
                r#"
                UPDATE inventory_items SET
                    quantity_on_hand = $3, quantity_reserved = $4, reorder_threshold = $5,
                    target_stock_level = $6, unit_cost_cents = $7, category = $8, attributes = $9,
                    is_active = $10, ledger_sequence = $11, version = $12, updated_at = $13
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(expected)
            .bind(item.quantity_on_hand)
            .bind(item.quantity_reserved)
            .bind(item.reorder_threshold)
            .bind(item.target_stock_level)
            .bind(item.unit_cost_cents)
            .bind(item.category.as_deref())
            .bind(&attributes)
            .bind(item.is_active)
            .bind(item.ledger_sequence.as_i64())
            .bind(item.version)
            .bind(item.updated_at)
            .execute(&mut *conn)
            .await?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::ItemVersionConflict {
                    item_id: item.id,
                    expected,
                });
            }

            check_capacity(conn, item).await?;

            sqlx::query("DELETE FROM item_locations WHERE inventory_item_id = $1")
                .bind(item.id.as_uuid())
                .execute(&mut *conn)
                .await?;
        }
    }

    for (position, entry) in item.locations.iter().enumerate() {
        sqlx::query(
            "INSERT INTO item_locations (inventory_item_id, location_id, position, quantity) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(item.id.as_uuid())
        .bind(entry.location_id.as_uuid())
        .bind(position as i32)
        .bind(entry.quantity)
        .execute(&mut *conn)
        .await?;
    }

    if let Some(first) = write.transactions.first() {
        let expected = Sequence::new(first.sequence.as_i64() - 1);
        stock_ledger::postgres::append_in(
            conn,
            &write.transactions,
            &AppendOptions::expect_sequence(expected),
        )
        .await?;
    }

    Ok(())
}

/// Rejects the write if `item` gained units at a location whose item limit
/// cannot take them.
///
/// Runs after the item row is locked by its update and before its
/// `item_locations` rows are replaced. Each grown location row is locked in
/// id order so concurrent writers to one bin check occupancy one at a time.
async fn check_capacity(conn: &mut PgConnection, item: &InventoryItem) -> Result<()> {
    let rows = sqlx::query(
        "SELECT location_id, quantity FROM item_locations WHERE inventory_item_id = $1",
    )
    .bind(item.id.as_uuid())
    .fetch_all(&mut *conn)
    .await?;
    let mut previous = HashMap::new();
    for row in &rows {
        let location_id: Uuid = row.try_get("location_id")?;
        previous.insert(location_id, row.try_get::<i64, _>("quantity")?);
    }

    let mut grown: Vec<(LocationId, i64)> = item
        .locations
        .iter()
        .map(|entry| {
            let before = previous
                .get(&entry.location_id.as_uuid())
                .copied()
                .unwrap_or(0);
            (entry.location_id, entry.quantity - before)
        })
        .filter(|(_, increase)| *increase > 0)
        .collect();
    grown.sort_by_key(|(location_id, _)| *location_id);

    for (location_id, increase) in grown {
        let max_items: Option<i64> =
            sqlx::query_scalar("SELECT max_items FROM locations WHERE id = $1 FOR UPDATE")
                .bind(location_id.as_uuid())
                .fetch_optional(&mut *conn)
                .await?
                .flatten();
        let Some(max) = max_items else {
            continue;
        };
        let occupied: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM item_locations WHERE location_id = $1",
        )
        .bind(location_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;
        if occupied + increase > max {
            return Err(RepositoryError::LocationCapacityExceeded {
                location_id,
                capacity: max,
                occupied,
                requested: increase,
            });
        }
    }
    Ok(())
}

fn duplicate_allocation(e: sqlx::Error, a: &Allocation) -> RepositoryError {
    map_unique(e, |constraint| match constraint {
        "allocations_pkey" => Some(RepositoryError::AllocationVersionConflict {
            allocation_id: a.id,
            expected: 0,
        }),
        "unique_live_allocation" => Some(RepositoryError::DuplicateAllocation {
            order_id: a.order_id,
            order_item_id: a.order_item_id,
            inventory_item_id: a.inventory_item_id,
        }),
        _ => None,
    })
}

async fn write_allocation(conn: &mut PgConnection, write: &AllocationWrite) -> Result<()> {
    match write {
        AllocationWrite::Insert(a) => {
            sqlx::query(
                r#"
                INSERT INTO allocations (
                    id, order_id, order_item_id, inventory_item_id, warehouse_id, quantity,
                    status, expires_at, cancellation_reason, version, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(a.id.as_uuid())
            .bind(a.order_id.as_uuid())
            .bind(a.order_item_id.as_uuid())
            .bind(a.inventory_item_id.as_uuid())
            .bind(a.warehouse_id.as_uuid())
            .bind(a.quantity)
            .bind(a.status.as_str())
            .bind(a.expires_at)
            .bind(a.cancellation_reason.as_deref())
            .bind(a.version)
            .bind(a.created_at)
            .bind(a.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| duplicate_allocation(e, a))?;
        }
        AllocationWrite::Update {
            allocation: a,
            expected_version,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE allocations SET
                    inventory_item_id = $3, warehouse_id = $4, quantity = $5, status = $6,
                    expires_at = $7, cancellation_reason = $8, version = $9, updated_at = $10
                WHERE id = $1 AND version = $2
                "#,
            )
            .bind(a.id.as_uuid())
            .bind(*expected_version)
            .bind(a.inventory_item_id.as_uuid())
            .bind(a.warehouse_id.as_uuid())
            .bind(a.quantity)
            .bind(a.status.as_str())
            .bind(a.expires_at)
            .bind(a.cancellation_reason.as_deref())
            .bind(a.version)
            .bind(a.updated_at)
            .execute(&mut *conn)
            .await
            .map_err(|e| duplicate_allocation(e, a))?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::AllocationVersionConflict {
                    allocation_id: a.id,
                    expected: *expected_version,
                });
            }
        }
    }
    Ok(())
}

async fn write_outbox(conn: &mut PgConnection, messages: &[OutboxMessage]) -> Result<()> {
    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, event_type, payload, attempts, last_error, created_at, dispatched_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.notification.event_type())
        .bind(serde_json::to_value(&message.notification)?)
        .bind(message.attempts)
        .bind(message.last_error.as_deref())
        .bind(message.created_at)
        .bind(message.dispatched_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    type Ledger = PostgresStockLedger;

    fn ledger(&self) -> &PostgresStockLedger {
        &self.ledger
    }

    async fn insert_warehouse(
        &self,
        warehouse: &Warehouse,
        zones: &[Zone],
        locations: &[Location],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO warehouses (
                id, name, code, warehouse_type, address, is_active, default_location_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(&warehouse.code)
        .bind(warehouse.warehouse_type.as_str())
        .bind(serde_json::to_value(&warehouse.address)?)
        .bind(warehouse.is_active)
        .bind(warehouse.default_location_id.as_uuid())
        .bind(warehouse.created_at)
        .bind(warehouse.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            map_unique(e, |constraint| {
                (constraint == "unique_warehouse_code")
                    .then(|| RepositoryError::DuplicateWarehouseCode(warehouse.code.clone()))
            })
        })?;

        for zone in zones {
            insert_zone_row(&mut tx, zone).await?;
        }
        for location in locations {
            insert_location_row(&mut tx, location).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_warehouse(&self, warehouse: &Warehouse) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE warehouses SET
                name = $2, warehouse_type = $3, address = $4, is_active = $5,
                default_location_id = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(warehouse.id.as_uuid())
        .bind(&warehouse.name)
        .bind(warehouse.warehouse_type.as_str())
        .bind(serde_json::to_value(&warehouse.address)?)
        .bind(warehouse.is_active)
        .bind(warehouse.default_location_id.as_uuid())
        .bind(warehouse.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Warehouse",
                id: warehouse.id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_warehouse(&self, id: WarehouseId) -> Result<Option<Warehouse>> {
        let row = sqlx::query(&format!("{WAREHOUSE_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn get_warehouse_by_code(&self, code: &str) -> Result<Option<Warehouse>> {
        let row = sqlx::query(&format!("{WAREHOUSE_COLUMNS} WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_warehouse).transpose()
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let rows = sqlx::query(&format!("{WAREHOUSE_COLUMNS} ORDER BY code ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_warehouse).collect()
    }

    async fn insert_zone(&self, zone: &Zone) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_zone_row(&mut conn, zone).await
    }

    async fn get_zone(&self, id: ZoneId) -> Result<Option<Zone>> {
        let row = sqlx::query(&format!("{ZONE_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_zone).transpose()
    }

    async fn list_zones(&self, warehouse_id: WarehouseId) -> Result<Vec<Zone>> {
        let rows = sqlx::query(&format!(
            "{ZONE_COLUMNS} WHERE warehouse_id = $1 ORDER BY created_at ASC"
        ))
        .bind(warehouse_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_zone).collect()
    }

    async fn insert_location(&self, location: &Location) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_location_row(&mut conn, location).await
    }

    async fn get_location(&self, id: LocationId) -> Result<Option<Location>> {
        let row = sqlx::query(&format!("{LOCATION_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_location).transpose()
    }

    async fn list_locations(&self, warehouse_id: WarehouseId) -> Result<Vec<Location>> {
        let rows = sqlx::query(&format!(
            "{LOCATION_COLUMNS} WHERE warehouse_id = $1 ORDER BY code ASC"
        ))
        .bind(warehouse_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_location).collect()
    }

    async fn location_occupancy(&self, id: LocationId) -> Result<i64> {
        let occupied: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM item_locations WHERE location_id = $1",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(occupied)
    }

    async fn get_item(&self, id: InventoryItemId) -> Result<Option<InventoryItem>> {
        let sql = format!("{ITEM_COLUMNS} WHERE id = $1");
        let items = self
            .fetch_items(sqlx::query(&sql).bind(id.as_uuid()))
            .await?;
        Ok(items.into_iter().next())
    }

    async fn find_item(
        &self,
        sku: &Sku,
        warehouse_id: WarehouseId,
    ) -> Result<Option<InventoryItem>> {
        let sql = format!("{ITEM_COLUMNS} WHERE sku = $1 AND warehouse_id = $2");
        let items = self
            .fetch_items(
                sqlx::query(&sql)
                    .bind(sku.as_str().to_string())
                    .bind(warehouse_id.as_uuid()),
            )
            .await?;
        Ok(items.into_iter().next())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<InventoryItem>> {
        let mut sql = format!("{ITEM_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if !filter.include_inactive {
            sql.push_str(" AND is_active");
        }
        if filter.warehouse_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
        }
        if filter.sku.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND sku = ${param_count}"));
        }
        if filter.category.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category = ${param_count}"));
        }

        sql.push_str(" ORDER BY sku ASC, warehouse_id ASC");

        if filter.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if filter.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(id) = filter.warehouse_id {
            query = query.bind(id.as_uuid());
        }
        if let Some(ref sku) = filter.sku {
            query = query.bind(sku.as_str().to_string());
        }
        if let Some(ref category) = filter.category {
            query = query.bind(category.clone());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            query = query.bind(offset as i64);
        }

        self.fetch_items(query).await
    }

    async fn get_allocation(&self, id: AllocationId) -> Result<Option<Allocation>> {
        let row = sqlx::query(&format!("{ALLOCATION_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_allocation).transpose()
    }

    async fn find_allocation(
        &self,
        order_id: OrderId,
        order_item_id: OrderItemId,
        inventory_item_id: InventoryItemId,
    ) -> Result<Option<Allocation>> {
        let row = sqlx::query(&format!(
            "{ALLOCATION_COLUMNS} WHERE order_id = $1 AND order_item_id = $2 \
             AND inventory_item_id = $3 AND status <> 'CANCELLED' \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(order_id.as_uuid())
        .bind(order_item_id.as_uuid())
        .bind(inventory_item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_allocation).transpose()
    }

    async fn list_allocations(&self, filter: &AllocationFilter) -> Result<Vec<Allocation>> {
        let mut sql = format!("{ALLOCATION_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if filter.order_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND order_id = ${param_count}"));
        }
        if filter.inventory_item_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND inventory_item_id = ${param_count}"));
        }
        if filter.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if filter.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if filter.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(id) = filter.order_id {
            query = query.bind(id.as_uuid());
        }
        if let Some(id) = filter.inventory_item_id {
            query = query.bind(id.as_uuid());
        }
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(limit) = filter.limit {
            query = query.bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            query = query.bind(offset as i64);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_allocation).collect()
    }

    async fn due_allocations(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Allocation>> {
        let rows = sqlx::query(&format!(
            "{ALLOCATION_COLUMNS} WHERE status = 'PENDING' AND expires_at <= $1 \
             ORDER BY expires_at ASC LIMIT $2"
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_allocation).collect()
    }

    async fn pending_outbox(&self, limit: usize, max_attempts: u32) -> Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            "SELECT id, payload, attempts, last_error, created_at, dispatched_at FROM outbox \
             WHERE dispatched_at IS NULL AND attempts < $2 ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .bind(max_attempts as i32)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_message).collect()
    }

    async fn mark_dispatched(&self, id: MessageId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE outbox SET attempts = attempts + 1, dispatched_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: MessageId, error: &str) -> Result<()> {
        sqlx::query("UPDATE outbox SET attempts = attempts + 1, last_error = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn commit(&self, unit: UnitOfWork) -> Result<()> {
        if unit.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        if let Some(ref write) = unit.item {
            write_item(&mut tx, write).await?;
        }
        if let Some(ref write) = unit.allocation {
            write_allocation(&mut tx, write).await?;
        }
        write_outbox(&mut tx, &unit.outbox).await?;

        tx.commit().await?;
        Ok(())
    }
}
