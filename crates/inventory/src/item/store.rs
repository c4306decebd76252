use std::sync::Arc;

use chrono::Utc;
use common::{InventoryItemId, LocationId, Sku, WarehouseId};
use serde::Serialize;
use stock_ledger::{
    Reconciliation, Reference, Sequence, StockLedger, StockLedgerExt, StockTransaction,
    TransactionQuery, TransactionType,
};

use super::{
    AddStock, AdjustStock, AssignLocation, CommitSale, InventoryItem, ItemFilter, NewItem,
    RecordCycleCount, RecordLoss, RecordReturn, StockChange, StockMovement,
};
use crate::config::InventoryConfig;
use crate::error::{InventoryError, Result};
use crate::outbox::{InventoryNotification, OutboxMessage};
use crate::repository::{AllocationWrite, InventoryRepository, ItemWrite, UnitOfWork};
use crate::warehouse::WarehouseRegistry;

/// Result of a stock operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMutation {
    /// Item state after the operation.
    pub item: InventoryItem,
    /// The ledger transaction recording the operation.
    pub transaction: StockTransaction,
    /// True if the request was a retry and the original transaction is returned.
    pub replayed: bool,
}

impl StockMutation {
    pub fn previous_quantity(&self) -> i64 {
        self.transaction.previous_quantity
    }

    pub fn new_quantity(&self) -> i64 {
        self.transaction.new_quantity
    }
}

/// What one attempt of a mutation writes, computed from a fresh read.
#[derive(Debug, Default)]
pub(crate) struct Plan {
    pub changes: Vec<StockChange>,
    pub allocation: Option<AllocationWrite>,
}

impl Plan {
    pub fn change(change: StockChange) -> Self {
        Self {
            changes: vec![change],
            allocation: None,
        }
    }

    pub fn with_allocation(mut self, allocation: AllocationWrite) -> Self {
        self.allocation = Some(allocation);
        self
    }
}

/// Outcome of [`InventoryItemStore::mutate`].
#[derive(Debug, Clone)]
pub(crate) struct Committed {
    pub item: InventoryItem,
    pub transactions: Vec<StockTransaction>,
    pub replayed: bool,
}

impl Committed {
    fn into_mutation(self) -> Option<StockMutation> {
        let transaction = self.transactions.into_iter().last()?;
        Some(StockMutation {
            item: self.item,
            transaction,
            replayed: self.replayed,
        })
    }
}

fn positive(field: &str, quantity: i64) -> Result<()> {
    if quantity <= 0 {
        return Err(InventoryError::Validation(format!(
            "{field} must be positive, got {quantity}"
        )));
    }
    Ok(())
}

fn not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(InventoryError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn committed(result: Committed) -> Result<StockMutation> {
    result.into_mutation().ok_or_else(|| {
        InventoryError::Validation("operation recorded no transaction".to_string())
    })
}

/// Current-state projection per SKU and warehouse.
///
/// Every quantity change is applied through [`InventoryItem::apply`] and
/// committed together with its ledger transaction. Writes are optimistic:
/// the commit succeeds only if the item's version is unchanged since it was
/// read, and a conflicting write re-reads and retries.
pub struct InventoryItemStore<R> {
    repo: Arc<R>,
    registry: WarehouseRegistry<R>,
    config: InventoryConfig,
}

impl<R> Clone for InventoryItemStore<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            registry: self.registry.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: InventoryRepository> InventoryItemStore<R> {
    pub fn new(repo: Arc<R>, config: InventoryConfig) -> Self {
        Self {
            registry: WarehouseRegistry::new(Arc::clone(&repo)),
            repo,
            config,
        }
    }

    pub fn registry(&self) -> &WarehouseRegistry<R> {
        &self.registry
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    /// Starts stocking a SKU in a warehouse with zero quantity.
    #[tracing::instrument(skip(self, request), fields(sku = %request.sku, warehouse_id = %request.warehouse_id))]
    pub async fn create_item(&self, request: NewItem) -> Result<InventoryItem> {
        let sku = Sku::new(request.sku.as_str());
        if sku.is_empty() {
            return Err(InventoryError::Validation("sku is required".to_string()));
        }
        not_blank("productId", request.product_id.as_str())?;
        validate_thresholds(request.reorder_threshold, request.target_stock_level)?;
        if request.unit_cost_cents < 0 {
            return Err(InventoryError::Validation(
                "unitCostCents must not be negative".to_string(),
            ));
        }
        self.registry.active_warehouse(request.warehouse_id).await?;

        if self
            .repo
            .find_item(&sku, request.warehouse_id)
            .await?
            .is_some()
        {
            return Err(InventoryError::DuplicateItem {
                sku,
                warehouse_id: request.warehouse_id,
            });
        }

        let now = Utc::now();
        let item = InventoryItem {
            id: InventoryItemId::new(),
            sku,
            product_id: request.product_id,
            warehouse_id: request.warehouse_id,
            quantity_on_hand: 0,
            quantity_reserved: 0,
            reorder_threshold: request.reorder_threshold,
            target_stock_level: request.target_stock_level,
            unit_cost_cents: request.unit_cost_cents,
            category: request.category.filter(|c| !c.trim().is_empty()),
            attributes: request.attributes,
            is_active: true,
            locations: Vec::new(),
            ledger_sequence: Sequence::initial(),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.repo
            .commit(UnitOfWork::new().item(ItemWrite {
                item: item.clone(),
                expected_version: None,
                transactions: Vec::new(),
            }))
            .await?;

        tracing::info!(item_id = %item.id, "inventory item created");
        Ok(item)
    }

    /// Returns the item stocking `template`'s SKU in `warehouse_id`, creating
    /// it from the template's catalog fields if it does not exist yet.
    #[tracing::instrument(skip(self, template), fields(sku = %template.sku))]
    pub async fn find_or_create_item(
        &self,
        template: &InventoryItem,
        warehouse_id: WarehouseId,
    ) -> Result<InventoryItem> {
        if let Some(item) = self.repo.find_item(&template.sku, warehouse_id).await? {
            return Ok(item);
        }

        let request = NewItem::new(template.sku.clone(), template.product_id.clone(), warehouse_id)
            .thresholds(template.reorder_threshold, template.target_stock_level)
            .unit_cost_cents(template.unit_cost_cents)
            .attributes(template.attributes.clone());
        let request = match template.category {
            Some(ref category) => request.category(category.clone()),
            None => request,
        };

        match self.create_item(request).await {
            // Created concurrently by another request.
            Err(InventoryError::DuplicateItem { sku, warehouse_id }) => self
                .repo
                .find_item(&sku, warehouse_id)
                .await?
                .ok_or(InventoryError::ItemNotStocked { sku, warehouse_id }),
            other => other,
        }
    }

    /// Fetches an item, active or not.
    pub async fn get_item(&self, id: InventoryItemId) -> Result<InventoryItem> {
        self.repo
            .get_item(id)
            .await?
            .ok_or(InventoryError::ItemNotFound(id))
    }

    async fn active_item(&self, id: InventoryItemId) -> Result<InventoryItem> {
        let item = self.get_item(id).await?;
        if !item.is_active {
            return Err(InventoryError::ItemNotFound(id));
        }
        Ok(item)
    }

    pub async fn find_item(&self, sku: &Sku, warehouse_id: WarehouseId) -> Result<InventoryItem> {
        self.repo
            .find_item(sku, warehouse_id)
            .await?
            .ok_or_else(|| InventoryError::ItemNotStocked {
                sku: sku.clone(),
                warehouse_id,
            })
    }

    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<InventoryItem>> {
        Ok(self.repo.list_items(filter).await?)
    }

    /// Receives stock (RECEIPT).
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn add_stock(&self, item_id: InventoryItemId, request: AddStock) -> Result<StockMutation> {
        positive("quantity", request.quantity)?;
        let item = self.active_item(item_id).await?;
        let location = self
            .registry
            .resolve_location(item.warehouse_id, request.location_id)
            .await?;

        let change = StockChange::new(TransactionType::Receipt, request.quantity)
            .at(Some(location))
            .reference(request.reference.clone())
            .by(request.created_by);
        let dedup = request.reference.as_ref().map(|r| (r, TransactionType::Receipt));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Applies a signed correction to on-hand stock (ADJUSTMENT).
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn adjust_stock(
        &self,
        item_id: InventoryItemId,
        request: AdjustStock,
    ) -> Result<StockMutation> {
        if request.quantity == 0 {
            return Err(InventoryError::Validation(
                "quantity must not be zero".to_string(),
            ));
        }
        not_blank("reason", &request.reason)?;
        let item = self.active_item(item_id).await?;
        let location = self
            .target_location(&item, request.quantity, request.location_id)
            .await?;

        let change = StockChange::new(TransactionType::Adjustment, request.quantity)
            .at(location)
            .reference(request.reference.clone())
            .reason(Some(request.reason))
            .by(request.created_by);
        let dedup = request
            .reference
            .as_ref()
            .map(|r| (r, TransactionType::Adjustment));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Reserves available stock (RESERVATION).
    ///
    /// Fails with `InsufficientStock` if fewer than `quantity` units are
    /// available at the moment of the write.
    #[tracing::instrument(skip(self, reference))]
    pub async fn reserve(
        &self,
        item_id: InventoryItemId,
        quantity: i64,
        reference: Option<Reference>,
    ) -> Result<StockMutation> {
        positive("quantity", quantity)?;
        let change = StockChange::new(TransactionType::Reservation, quantity)
            .reference(reference.clone());
        let dedup = reference.as_ref().map(|r| (r, TransactionType::Reservation));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Releases reserved stock (RESERVATION_RELEASE).
    ///
    /// Releasing more than is reserved releases what is there; releasing
    /// from an item with nothing reserved records nothing and returns None.
    #[tracing::instrument(skip(self, reference))]
    pub async fn release(
        &self,
        item_id: InventoryItemId,
        quantity: i64,
        reference: Option<Reference>,
    ) -> Result<Option<StockMutation>> {
        positive("quantity", quantity)?;
        let dedup = reference
            .as_ref()
            .map(|r| (r, TransactionType::ReservationRelease));

        let result = self
            .mutate(item_id, dedup, |item| {
                Ok(match release_change(item, quantity, reference.clone()) {
                    Some(change) => Plan::change(change),
                    None => Plan::default(),
                })
            })
            .await?;
        Ok(result.into_mutation())
    }

    /// Consumes reserved stock (SALE).
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn commit_sale(
        &self,
        item_id: InventoryItemId,
        request: CommitSale,
    ) -> Result<StockMutation> {
        positive("quantity", request.quantity)?;
        let item = self.get_item(item_id).await?;
        if let Some(location_id) = request.location_id {
            self.registry.location_in(item.warehouse_id, location_id).await?;
        }

        let change = StockChange::new(TransactionType::Sale, -request.quantity)
            .at(request.location_id)
            .reference(request.reference.clone())
            .by(request.created_by);
        let dedup = request.reference.as_ref().map(|r| (r, TransactionType::Sale));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Takes returned goods back into stock (RETURN).
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn record_return(
        &self,
        item_id: InventoryItemId,
        request: RecordReturn,
    ) -> Result<StockMutation> {
        positive("quantity", request.quantity)?;
        let item = self.active_item(item_id).await?;
        let location = self
            .registry
            .resolve_location(item.warehouse_id, request.location_id)
            .await?;

        let change = StockChange::new(TransactionType::Return, request.quantity)
            .at(Some(location))
            .reference(request.reference.clone())
            .reason(request.reason)
            .by(request.created_by);
        let dedup = request.reference.as_ref().map(|r| (r, TransactionType::Return));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Writes off damaged or expired stock (DAMAGE / EXPIRY).
    #[tracing::instrument(skip(self, request), fields(kind = ?request.kind, quantity = request.quantity))]
    pub async fn record_loss(
        &self,
        item_id: InventoryItemId,
        request: RecordLoss,
    ) -> Result<StockMutation> {
        positive("quantity", request.quantity)?;
        let item = self.active_item(item_id).await?;
        if let Some(location_id) = request.location_id {
            self.registry.location_in(item.warehouse_id, location_id).await?;
        }

        let change = StockChange::new(request.kind.transaction_type(), -request.quantity)
            .at(request.location_id)
            .reason(request.reason)
            .by(request.created_by);

        committed(
            self.mutate(item_id, None, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Records a physical count as the signed difference from the book
    /// quantity (CYCLE_COUNT).
    #[tracing::instrument(skip(self, request), fields(counted = request.counted))]
    pub async fn record_cycle_count(
        &self,
        item_id: InventoryItemId,
        request: RecordCycleCount,
    ) -> Result<StockMutation> {
        if request.counted < 0 {
            return Err(InventoryError::Validation(
                "counted quantity must not be negative".to_string(),
            ));
        }
        let item = self.active_item(item_id).await?;
        let named = match request.location_id {
            Some(location_id) => Some(
                self.registry
                    .location_in(item.warehouse_id, location_id)
                    .await?
                    .id,
            ),
            None => None,
        };
        let receiving = self.registry.resolve_location(item.warehouse_id, None).await?;
        let dedup = request
            .reference
            .as_ref()
            .map(|r| (r, TransactionType::CycleCount));

        committed(
            self.mutate(item_id, dedup, |item| {
                let (book, location) = match named {
                    Some(location_id) => (item.quantity_at(location_id), Some(location_id)),
                    None => (item.quantity_on_hand, None),
                };
                let delta = request.counted - book;
                let location = match location {
                    Some(location_id) => Some(location_id),
                    None if delta > 0 => Some(receiving),
                    None => None,
                };
                Ok(Plan::change(
                    StockChange::new(TransactionType::CycleCount, delta)
                        .at(location)
                        .reference(request.reference.clone())
                        .reason(Some(format!("counted {} against {book}", request.counted)))
                        .by(request.created_by.clone()),
                ))
            })
            .await?,
        )
    }

    /// Moves units between two locations of the item (LOCATION_ASSIGNMENT).
    #[tracing::instrument(skip(self, request), fields(quantity = request.quantity))]
    pub async fn assign_location(
        &self,
        item_id: InventoryItemId,
        request: AssignLocation,
    ) -> Result<StockMutation> {
        positive("quantity", request.quantity)?;
        let item = self.active_item(item_id).await?;
        self.registry.location_in(item.warehouse_id, request.from).await?;
        self.registry.location_in(item.warehouse_id, request.to).await?;

        let change = StockChange::new(TransactionType::LocationAssignment, request.quantity)
            .at(Some(request.from))
            .to(request.to)
            .by(request.created_by);

        committed(
            self.mutate(item_id, None, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Records a transfer leg or compensating adjustment with caller-chosen
    /// transaction ids.
    #[tracing::instrument(skip(self, movement), fields(transaction_type = %movement.transaction_type, quantity = movement.quantity))]
    pub async fn record_movement(
        &self,
        item_id: InventoryItemId,
        movement: StockMovement,
    ) -> Result<StockMutation> {
        if !matches!(
            movement.transaction_type,
            TransactionType::TransferOut | TransactionType::TransferIn | TransactionType::Adjustment
        ) {
            return Err(InventoryError::Validation(format!(
                "{} is not a stock movement",
                movement.transaction_type
            )));
        }
        if movement.quantity == 0 {
            return Err(InventoryError::Validation(
                "quantity must not be zero".to_string(),
            ));
        }
        let item = self.active_item(item_id).await?;
        let location = self
            .target_location(&item, movement.quantity, movement.location_id)
            .await?;

        let change = StockChange::new(movement.transaction_type, movement.quantity)
            .at(location)
            .with_id(Some(movement.transaction_id))
            .related_to(movement.related_transaction_id)
            .reference(movement.reference.clone())
            .reason(movement.reason)
            .by(movement.created_by);
        let dedup = movement
            .reference
            .as_ref()
            .map(|r| (r, movement.transaction_type));

        committed(
            self.mutate(item_id, dedup, |_| Ok(Plan::change(change.clone())))
                .await?,
        )
    }

    /// Changes the reorder threshold and target stock level.
    #[tracing::instrument(skip(self))]
    pub async fn update_thresholds(
        &self,
        item_id: InventoryItemId,
        reorder_threshold: i64,
        target_stock_level: i64,
    ) -> Result<InventoryItem> {
        validate_thresholds(reorder_threshold, target_stock_level)?;
        self.revise(item_id, |item| {
            let mut next = item.clone();
            next.reorder_threshold = reorder_threshold;
            next.target_stock_level = target_stock_level;
            Ok(next)
        })
        .await
    }

    /// Soft-deletes an item. Refused while any stock is reserved against it.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_item(&self, item_id: InventoryItemId) -> Result<InventoryItem> {
        self.revise(item_id, |item| {
            if item.quantity_reserved > 0 {
                return Err(InventoryError::ItemInUse {
                    item_id: item.id,
                    reserved: item.quantity_reserved,
                });
            }
            let mut next = item.clone();
            next.is_active = false;
            Ok(next)
        })
        .await
    }

    /// Ledger transactions matching `query`.
    pub async fn transactions(&self, query: TransactionQuery) -> Result<Vec<StockTransaction>> {
        Ok(self.repo.ledger().query_transactions(query).await?)
    }

    /// Replays the item's ledger and compares it with the stored quantities.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, item_id: InventoryItemId) -> Result<Reconciliation> {
        let item = self.get_item(item_id).await?;
        let replay = self.repo.ledger().replay_item(item_id).await?;
        let reconciliation =
            replay.reconcile(item_id, item.quantity_on_hand, item.quantity_reserved);
        if !reconciliation.consistent {
            tracing::error!(
                item_id = %item_id,
                replayed_on_hand = reconciliation.replayed_on_hand,
                projected_on_hand = item.quantity_on_hand,
                "ledger does not reconcile with item"
            );
        }
        Ok(reconciliation)
    }

    /// Location an on-hand movement uses: a positive movement lands in the
    /// named location or the receiving location; a negative one draws from
    /// the named location, or from all locations when none is named.
    async fn target_location(
        &self,
        item: &InventoryItem,
        quantity: i64,
        location_id: Option<LocationId>,
    ) -> Result<Option<LocationId>> {
        if quantity > 0 {
            return Ok(Some(
                self.registry
                    .resolve_location(item.warehouse_id, location_id)
                    .await?,
            ));
        }
        match location_id {
            Some(id) => Ok(Some(self.registry.location_in(item.warehouse_id, id).await?.id)),
            None => Ok(None),
        }
    }

    /// Read, plan, apply and commit, retrying on a conflicting write.
    ///
    /// With `dedup` set, a transaction already recorded for this item under
    /// the same reference and type is returned instead of writing again.
    pub(crate) async fn mutate<F>(
        &self,
        item_id: InventoryItemId,
        dedup: Option<(&Reference, TransactionType)>,
        mut plan: F,
    ) -> Result<Committed>
    where
        F: FnMut(&InventoryItem) -> Result<Plan> + Send,
    {
        let attempts = self.config.max_conflict_retries;

        for attempt in 1..=attempts {
            let item = self.get_item(item_id).await?;

            if let Some((reference, transaction_type)) = dedup
                && let Some(original) = self.find_recorded(item_id, reference, transaction_type).await?
            {
                tracing::info!(item_id = %item_id, reference = %reference, "replaying recorded transaction");
                return Ok(Committed {
                    item,
                    transactions: vec![original],
                    replayed: true,
                });
            }

            let planned = plan(&item)?;

            for change in &planned.changes {
                if let Some((location_id, incoming)) = change.incoming() {
                    self.registry.check_capacity(location_id, incoming).await?;
                }
            }

            let now = Utc::now();
            let mut next = item.clone();
            let mut transactions = Vec::with_capacity(planned.changes.len());
            let mut outbox = Vec::new();
            for change in &planned.changes {
                let applied = next.apply(change, now)?;
                outbox.extend(
                    InventoryNotification::for_change(&next, &applied.item, &applied.transaction)
                        .into_iter()
                        .map(|n| OutboxMessage::new(n, now)),
                );
                transactions.push(applied.transaction);
                next = applied.item;
            }
            next.check_invariants()?;

            let unit = if transactions.is_empty() {
                UnitOfWork::new().allocation(planned.allocation)
            } else {
                UnitOfWork::new()
                    .item(ItemWrite {
                        item: next.clone(),
                        expected_version: Some(item.version),
                        transactions: transactions.clone(),
                    })
                    .allocation(planned.allocation)
                    .outbox(outbox)
            };

            if unit.is_empty() {
                return Ok(Committed {
                    item,
                    transactions,
                    replayed: false,
                });
            }

            match self.repo.commit(unit).await {
                Ok(()) => {
                    for tx in &transactions {
                        metrics::counter!("inventory_mutations_total", "type" => tx.transaction_type.as_str())
                            .increment(1);
                        tracing::debug!(
                            item_id = %item_id,
                            transaction_type = %tx.transaction_type,
                            quantity = tx.quantity,
                            previous = tx.previous_quantity,
                            new = tx.new_quantity,
                            "stock mutated"
                        );
                    }
                    let item = if transactions.is_empty() { item } else { next };
                    return Ok(Committed {
                        item,
                        transactions,
                        replayed: false,
                    });
                }
                Err(e) if e.is_item_conflict() => {
                    metrics::counter!("inventory_conflict_retries_total").increment(1);
                    tracing::debug!(item_id = %item_id, attempt, "write conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(item_id = %item_id, attempts, "giving up after repeated write conflicts");
        Err(InventoryError::ConcurrencyExhausted { item_id, attempts })
    }

    async fn find_recorded(
        &self,
        item_id: InventoryItemId,
        reference: &Reference,
        transaction_type: TransactionType,
    ) -> Result<Option<StockTransaction>> {
        let recorded = self.repo.ledger().find_by_reference(reference).await?;
        Ok(recorded
            .into_iter()
            .find(|tx| tx.inventory_item_id == item_id && tx.transaction_type == transaction_type))
    }

    /// Compare-and-swap loop for edits that record no ledger transaction.
    async fn revise<F>(&self, item_id: InventoryItemId, mut edit: F) -> Result<InventoryItem>
    where
        F: FnMut(&InventoryItem) -> Result<InventoryItem> + Send,
    {
        let attempts = self.config.max_conflict_retries;
        for _ in 0..attempts {
            let item = self.get_item(item_id).await?;
            let mut next = edit(&item)?;
            next.version = item.version + 1;
            next.updated_at = Utc::now();

            let unit = UnitOfWork::new().item(ItemWrite {
                item: next.clone(),
                expected_version: Some(item.version),
                transactions: Vec::new(),
            });
            match self.repo.commit(unit).await {
                Ok(()) => return Ok(next),
                Err(e) if e.is_item_conflict() => {
                    metrics::counter!("inventory_conflict_retries_total").increment(1);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(InventoryError::ConcurrencyExhausted { item_id, attempts })
    }
}

/// Release change for `requested` units, clamped to what is reserved.
pub(crate) fn release_change(
    item: &InventoryItem,
    requested: i64,
    reference: Option<Reference>,
) -> Option<StockChange> {
    let releasable = requested.min(item.quantity_reserved);
    if releasable < requested {
        tracing::warn!(
            item_id = %item.id,
            requested,
            reserved = item.quantity_reserved,
            "release exceeds reserved quantity, clamping"
        );
    }
    (releasable > 0).then(|| {
        StockChange::new(TransactionType::ReservationRelease, -releasable).reference(reference)
    })
}

fn validate_thresholds(reorder_threshold: i64, target_stock_level: i64) -> Result<()> {
    if reorder_threshold < 0 {
        return Err(InventoryError::Validation(
            "reorderThreshold must not be negative".to_string(),
        ));
    }
    if target_stock_level < reorder_threshold {
        return Err(InventoryError::Validation(
            "targetStockLevel must be at least reorderThreshold".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::tests::item_with;

    #[test]
    fn release_is_clamped_to_reserved() {
        let item = item_with(10, 3, LocationId::new());
        let change = release_change(&item, 5, None).unwrap();
        assert_eq!(change.quantity, -3);
    }

    #[test]
    fn release_with_nothing_reserved_is_a_no_op() {
        let item = item_with(10, 0, LocationId::new());
        assert!(release_change(&item, 5, None).is_none());
    }

    #[test]
    fn thresholds_must_be_ordered() {
        assert!(validate_thresholds(5, 20).is_ok());
        assert!(validate_thresholds(0, 0).is_ok());
        assert!(validate_thresholds(-1, 20).is_err());
        assert!(validate_thresholds(10, 5).is_err());
    }
}
