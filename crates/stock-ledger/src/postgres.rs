use async_trait::async_trait;
use common::{InventoryItemId, LocationId, TransactionId, WarehouseId};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    LedgerError, Reference, Result, Sequence, StockTransaction, TransactionQuery, TransactionType,
    store::{AppendOptions, StockLedger, TransactionStream, validate_for_append},
};

const SELECT_COLUMNS: &str = "SELECT id, transaction_type, inventory_item_id, sequence, quantity, \
     warehouse_id, location_id, reference_type, reference_number, related_transaction_id, \
     previous_quantity, new_quantity, reason, created_at, created_by FROM stock_transactions";

/// PostgreSQL-backed stock ledger.
#[derive(Clone)]
pub struct PostgresStockLedger {
    pool: PgPool,
}

impl PostgresStockLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        run_migrations(&self.pool).await
    }
}

/// Runs the workspace migrations against `pool`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// Decodes a `stock_transactions` row.
pub fn row_to_transaction(row: &PgRow) -> Result<StockTransaction> {
    let transaction_type: String = row.try_get("transaction_type")?;
    let reference_type: Option<String> = row.try_get("reference_type")?;
    let reference_number: Option<String> = row.try_get("reference_number")?;
    let reference = match (reference_type, reference_number) {
        (Some(t), Some(n)) => Some(Reference::new(t, n)),
        _ => None,
    };

    Ok(StockTransaction {
        id: TransactionId::from_uuid(row.try_get::<Uuid, _>("id")?),
        transaction_type: transaction_type.parse::<TransactionType>()?,
        inventory_item_id: InventoryItemId::from_uuid(row.try_get::<Uuid, _>("inventory_item_id")?),
        sequence: Sequence::new(row.try_get("sequence")?),
        quantity: row.try_get("quantity")?,
        warehouse_id: WarehouseId::from_uuid(row.try_get::<Uuid, _>("warehouse_id")?),
        location_id: row
            .try_get::<Option<Uuid>, _>("location_id")?
            .map(LocationId::from_uuid),
        reference,
        related_transaction_id: row
            .try_get::<Option<Uuid>, _>("related_transaction_id")?
            .map(TransactionId::from_uuid),
        previous_quantity: row.try_get("previous_quantity")?,
        new_quantity: row.try_get("new_quantity")?,
        reason: row.try_get("reason")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
    })
}

/// Appends transactions on an existing connection.
///
/// The caller owns the surrounding database transaction; this lets the
/// inventory repository write the item row and its ledger entries in one
/// commit.
pub async fn append_in(
    conn: &mut PgConnection,
    transactions: &[StockTransaction],
    options: &AppendOptions,
) -> Result<Sequence> {
    validate_for_append(transactions)?;

    let item_id = transactions[0].inventory_item_id;

    if let Some(expected) = options.expected_sequence {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM stock_transactions WHERE inventory_item_id = $1",
        )
        .bind(item_id.as_uuid())
        .fetch_one(&mut *conn)
        .await?;

        let actual = Sequence::new(current.unwrap_or(0));
        if actual != expected {
            return Err(LedgerError::SequenceConflict {
                item_id,
                expected,
                actual,
            });
        }
    }

    let mut last = Sequence::initial();
    for tx in transactions {
        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, transaction_type, inventory_item_id, sequence, quantity, warehouse_id,
                location_id, reference_type, reference_number, related_transaction_id,
                previous_quantity, new_quantity, reason, created_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(tx.id.as_uuid())
        .bind(tx.transaction_type.as_str())
        .bind(tx.inventory_item_id.as_uuid())
        .bind(tx.sequence.as_i64())
        .bind(tx.quantity)
        .bind(tx.warehouse_id.as_uuid())
        .bind(tx.location_id.map(|id| id.as_uuid()))
        .bind(tx.reference.as_ref().map(|r| r.reference_type.as_str()))
        .bind(tx.reference.as_ref().map(|r| r.reference_number.as_str()))
        .bind(tx.related_transaction_id.map(|id| id.as_uuid()))
        .bind(tx.previous_quantity)
        .bind(tx.new_quantity)
        .bind(tx.reason.as_deref())
        .bind(tx.created_at)
        .bind(&tx.created_by)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                match db_err.constraint() {
                    Some("unique_item_sequence") => {
                        return LedgerError::SequenceConflict {
                            item_id,
                            expected: options.expected_sequence.unwrap_or(Sequence::initial()),
                            actual: tx.sequence,
                        };
                    }
                    Some("stock_transactions_pkey") => {
                        return LedgerError::DuplicateTransaction(tx.id);
                    }
                    _ => {}
                }
            }
            LedgerError::Database(e)
        })?;

        last = tx.sequence;
    }

    metrics::counter!("ledger_transactions_appended_total")
        .increment(transactions.len() as u64);
    tracing::debug!(item_id = %item_id, sequence = %last, appended = transactions.len(), "appended to ledger");

    Ok(last)
}

#[async_trait]
impl StockLedger for PostgresStockLedger {
    async fn append(
        &self,
        transactions: Vec<StockTransaction>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        let mut tx = self.pool.begin().await?;
        let last = append_in(&mut tx, &transactions, &options).await?;
        tx.commit().await?;
        Ok(last)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_transaction).transpose()
    }

    async fn get_transactions_for_item(
        &self,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockTransaction>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE inventory_item_id = $1 ORDER BY sequence ASC"
        ))
        .bind(item_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<StockTransaction>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.inventory_item_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND inventory_item_id = ${param_count}"));
        }
        if query.warehouse_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND warehouse_id = ${param_count}"));
        }
        if query.transaction_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND transaction_type = ANY(${param_count})"));
        }
        if query.reference.is_some() {
            sql.push_str(&format!(
                " AND reference_type = ${} AND reference_number = ${}",
                param_count + 1,
                param_count + 2
            ));
            param_count += 2;
        }
        if query.related_transaction_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND related_transaction_id = ${param_count}"));
        }
        if query.from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, sequence ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.inventory_item_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(id) = query.warehouse_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(types) = query.transaction_types {
            let types: Vec<String> = types.iter().map(|t| t.as_str().to_string()).collect();
            sqlx_query = sqlx_query.bind(types);
        }
        if let Some(reference) = query.reference {
            sqlx_query = sqlx_query
                .bind(reference.reference_type)
                .bind(reference.reference_number);
        }
        if let Some(related) = query.related_transaction_id {
            sqlx_query = sqlx_query.bind(related.as_uuid());
        }
        if let Some(from) = query.from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_transaction).collect()
    }

    async fn find_by_reference(&self, reference: &Reference) -> Result<Vec<StockTransaction>> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE reference_type = $1 AND reference_number = $2 ORDER BY created_at ASC"
        ))
        .bind(&reference.reference_type)
        .bind(&reference.reference_number)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn stream_all(&self) -> Result<TransactionStream> {
        use futures_util::stream;

        // Rows are buffered so the stream does not borrow the pool.
        let rows = sqlx::query(&format!("{SELECT_COLUMNS} ORDER BY created_at ASC, id ASC"))
            .fetch_all(&self.pool)
            .await?;
        let transactions: Vec<Result<StockTransaction>> =
            rows.iter().map(row_to_transaction).collect();

        Ok(Box::pin(stream::iter(transactions)))
    }

    async fn get_item_sequence(&self, item_id: InventoryItemId) -> Result<Option<Sequence>> {
        let sequence: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(sequence) FROM stock_transactions WHERE inventory_item_id = $1",
        )
        .bind(item_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(sequence.map(Sequence::new))
    }
}
