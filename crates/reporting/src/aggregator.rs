//! Loads items and ledger history and hands them to the report builders.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{InventoryItemId, WarehouseId};
use inventory::{InventoryItem, InventoryRepository, ItemFilter};
use stock_ledger::{StockLedger, StockLedgerExt, TransactionQuery};

use crate::error::{ReportError, Result};
use crate::reports::turnover::TurnoverAccumulator;
use crate::reports::{
    self, InventoryValueReport, ItemHistory, LowStockQuery, LowStockReport, MovementQuery,
    MovementSeries, StockoutReport, TurnoverQuery, TurnoverReport, ValueQuery,
};

/// Read-only report service.
///
/// Reads the current item rows and replays ledger history; never writes.
pub struct ReportingAggregator<R> {
    repo: Arc<R>,
}

impl<R> Clone for ReportingAggregator<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
        }
    }
}

impl<R: InventoryRepository> ReportingAggregator<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    #[tracing::instrument(skip(self))]
    pub async fn low_stock(&self, query: &LowStockQuery) -> Result<LowStockReport> {
        query.validate()?;
        let items = self.items(None, query.warehouse_id).await?;
        let report = reports::low_stock::low_stock(&items, query.threshold_percentage);
        metrics::counter!("reports_generated_total", "report" => "low_stock").increment(1);
        Ok(report)
    }

    #[tracing::instrument(skip(self))]
    pub async fn inventory_value(&self, query: &ValueQuery) -> Result<InventoryValueReport> {
        let items = self.items(None, query.warehouse_id).await?;
        metrics::counter!("reports_generated_total", "report" => "inventory_value").increment(1);
        Ok(reports::valuation::inventory_value(&items, query.group_by))
    }

    #[tracing::instrument(skip(self))]
    pub async fn stock_movements(&self, query: &MovementQuery) -> Result<MovementSeries> {
        reports::check_window(query.from, query.to)?;
        let mut ledger_query = TransactionQuery::new().since(query.from).until(query.to);
        if let Some(item_id) = query.inventory_item_id {
            ledger_query = ledger_query.item(item_id);
        }
        if let Some(warehouse_id) = query.warehouse_id {
            ledger_query = ledger_query.warehouse(warehouse_id);
        }
        let transactions = self.repo.ledger().query_transactions(ledger_query).await?;
        metrics::counter!("reports_generated_total", "report" => "stock_movements").increment(1);
        Ok(reports::movements::movement_series(
            &transactions,
            query.bucket,
            query.from,
            query.to,
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn turnover(&self, query: &TurnoverQuery) -> Result<TurnoverReport> {
        reports::check_window(query.from, query.to)?;
        let items = self
            .items(query.inventory_item_id, query.warehouse_id)
            .await?;

        let mut accumulator = TurnoverAccumulator::default();
        for item in &items {
            let replay = self.repo.ledger().replay_item(item.id).await?;
            accumulator.add(item, replay.points(), query.from, query.to);
        }
        metrics::counter!("reports_generated_total", "report" => "turnover").increment(1);
        Ok(accumulator.finish(query.from, query.to))
    }

    /// Stockout intervals of one item between `from` and `to`.
    ///
    /// The window is clipped to the item's lifetime: it starts no earlier
    /// than the item's creation and ends no later than now.
    #[tracing::instrument(skip(self))]
    pub async fn stockouts(
        &self,
        item_id: InventoryItemId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<StockoutReport> {
        reports::check_window(from, to)?;
        let item = self.item(item_id).await?;
        let start = from.max(item.created_at);
        let end = to.min(Utc::now());

        let replay = self.repo.ledger().replay_item(item_id).await?;
        metrics::counter!("reports_generated_total", "report" => "stockouts").increment(1);
        Ok(reports::stockouts::stockouts(
            item_id,
            replay.points(),
            start,
            end.max(start),
        ))
    }

    #[tracing::instrument(skip(self))]
    pub async fn item_history(&self, item_id: InventoryItemId) -> Result<ItemHistory> {
        let item = self.item(item_id).await?;
        let replay = self.repo.ledger().replay_item(item_id).await?;
        let reconciliation =
            replay.reconcile(item_id, item.quantity_on_hand, item.quantity_reserved);
        if !reconciliation.consistent {
            tracing::error!(
                %item_id,
                replayed_on_hand = reconciliation.replayed_on_hand,
                projected_on_hand = reconciliation.projected_on_hand,
                "ledger replay disagrees with item quantities"
            );
        }
        Ok(ItemHistory {
            item,
            points: replay.points().to_vec(),
            reconciliation,
        })
    }

    async fn item(&self, item_id: InventoryItemId) -> Result<InventoryItem> {
        self.repo
            .get_item(item_id)
            .await?
            .ok_or(ReportError::ItemNotFound(item_id))
    }

    /// One item if named, otherwise every item in the warehouse (or
    /// everywhere), including deactivated ones.
    async fn items(
        &self,
        item_id: Option<InventoryItemId>,
        warehouse_id: Option<WarehouseId>,
    ) -> Result<Vec<InventoryItem>> {
        if let Some(item_id) = item_id {
            return Ok(vec![self.item(item_id).await?]);
        }
        let mut filter = ItemFilter::new().include_inactive();
        if let Some(warehouse_id) = warehouse_id {
            filter = filter.warehouse(warehouse_id);
        }
        Ok(self.repo.list_items(&filter).await?)
    }
}
