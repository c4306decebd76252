//! Coordinates the two legs of a transfer.

use common::{InventoryItemId, LocationId, TransactionId, WarehouseId};
use inventory::{
    InventoryError, InventoryItem, InventoryItemStore, InventoryRepository, StockMovement,
    StockMutation,
};
use serde::{Deserialize, Serialize};
use stock_ledger::{Reference, StockTransaction, TransactionQuery, TransactionType};

use crate::error::{Result, TransferError};
use crate::steps;

/// A request to move stock between warehouses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub quantity: i64,
    pub source_warehouse_id: WarehouseId,
    pub destination_warehouse_id: WarehouseId,
    /// Location to draw from; stocking order when unset.
    #[serde(default)]
    pub source_location_id: Option<LocationId>,
    /// Location to put away to; the destination's receiving location when unset.
    #[serde(default)]
    pub destination_location_id: Option<LocationId>,
    /// Idempotency key. A retried transfer with the same reference resumes
    /// instead of debiting twice.
    #[serde(default)]
    pub reference: Option<Reference>,
    #[serde(default)]
    pub created_by: String,
}

impl TransferRequest {
    pub fn new(
        quantity: i64,
        source_warehouse_id: WarehouseId,
        destination_warehouse_id: WarehouseId,
    ) -> Self {
        Self {
            quantity,
            source_warehouse_id,
            destination_warehouse_id,
            source_location_id: None,
            destination_location_id: None,
            reference: None,
            created_by: "system".to_string(),
        }
    }

    pub fn from_location(mut self, location_id: LocationId) -> Self {
        self.source_location_id = Some(location_id);
        self
    }

    pub fn to_location(mut self, location_id: LocationId) -> Self {
        self.destination_location_id = Some(location_id);
        self
    }

    pub fn reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = actor.into();
        self
    }
}

/// A completed transfer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub outbound_transaction: StockTransaction,
    pub inbound_transaction: StockTransaction,
    pub source_item: InventoryItem,
    pub destination_item: InventoryItem,
}

/// Moves stock between warehouses as a debit followed by a credit.
///
/// No lock is held across the two items. A failed credit is undone by a
/// compensating credit of the source, never by rolling back the debit.
pub struct TransferCoordinator<R> {
    store: InventoryItemStore<R>,
}

impl<R> Clone for TransferCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<R: InventoryRepository> TransferCoordinator<R> {
    pub fn new(store: InventoryItemStore<R>) -> Self {
        Self { store }
    }

    /// Transfers `request.quantity` units of `item_id` to the destination
    /// warehouse.
    #[tracing::instrument(
        skip(self, request),
        fields(
            item_id = %item_id,
            quantity = request.quantity,
            source = %request.source_warehouse_id,
            destination = %request.destination_warehouse_id,
        )
    )]
    pub async fn transfer(
        &self,
        item_id: InventoryItemId,
        request: TransferRequest,
    ) -> Result<TransferOutcome> {
        let start = std::time::Instant::now();
        let result = self.run(item_id, &request).await;

        let outcome = match &result {
            Ok(_) => "completed",
            Err(TransferError::Compensated { .. }) => "compensated",
            Err(TransferError::CompensationFailed { .. }) => "compensation_failed",
            Err(_) => "rejected",
        };
        metrics::counter!("transfers_total", "outcome" => outcome).increment(1);
        metrics::histogram!("transfer_duration_seconds").record(start.elapsed().as_secs_f64());

        result
    }

    async fn run(
        &self,
        item_id: InventoryItemId,
        request: &TransferRequest,
    ) -> Result<TransferOutcome> {
        let source = self.validate(item_id, request).await?;

        // Both legs are written with each other's id, so the link resolves
        // whichever way the transfer ends.
        let outbound_id = TransactionId::new();
        let inbound_id = TransactionId::new();
        let reference = request
            .reference
            .clone()
            .unwrap_or_else(|| Reference::new(steps::TRANSFER_REFERENCE, outbound_id.to_string()));

        tracing::info!(step = steps::STEP_DEBIT_SOURCE, "transfer step started");
        let debit = self
            .store
            .record_movement(
                source.id,
                StockMovement::new(TransactionType::TransferOut, -request.quantity)
                    .at(request.source_location_id)
                    .with_id(outbound_id)
                    .related_to(inbound_id)
                    .reference(Some(reference.clone()))
                    .by(request.created_by.clone()),
            )
            .await?;

        // A retried transfer finds its original debit; continue with the
        // inbound id that debit was linked to.
        let inbound_id = debit
            .transaction
            .related_transaction_id
            .unwrap_or(inbound_id);
        if debit.replayed {
            let compensations = self
                .store
                .transactions(
                    TransactionQuery::for_item(source.id)
                        .reference(reference.clone())
                        .transaction_type(TransactionType::Adjustment),
                )
                .await?;
            if !compensations.is_empty() {
                return Err(TransferError::Validation(format!(
                    "transfer {} was already compensated",
                    reference.reference_number
                )));
            }
            tracing::info!(outbound_id = %debit.transaction.id, "resuming transfer from recorded debit");
        }

        tracing::info!(step = steps::STEP_RESOLVE_DESTINATION, "transfer step started");
        let destination = match self
            .store
            .find_or_create_item(&source, request.destination_warehouse_id)
            .await
        {
            Ok(item) => item,
            Err(cause) => {
                return Err(self
                    .compensate(
                        &debit,
                        inbound_id,
                        &reference,
                        request,
                        steps::STEP_RESOLVE_DESTINATION,
                        cause,
                    )
                    .await);
            }
        };

        tracing::info!(step = steps::STEP_CREDIT_DESTINATION, "transfer step started");
        let credit = match self
            .store
            .record_movement(
                destination.id,
                StockMovement::new(TransactionType::TransferIn, request.quantity)
                    .at(request.destination_location_id)
                    .with_id(inbound_id)
                    .related_to(debit.transaction.id)
                    .reference(Some(reference.clone()))
                    .by(request.created_by.clone()),
            )
            .await
        {
            Ok(credit) => credit,
            Err(cause) => {
                return Err(self
                    .compensate(
                        &debit,
                        inbound_id,
                        &reference,
                        request,
                        steps::STEP_CREDIT_DESTINATION,
                        cause,
                    )
                    .await);
            }
        };

        tracing::info!(
            outbound_id = %debit.transaction.id,
            inbound_id = %credit.transaction.id,
            destination_item_id = %credit.item.id,
            "transfer completed"
        );

        // The debit snapshot may be stale if the transfer was resumed.
        let source_item = if debit.replayed {
            self.store.get_item(source.id).await?
        } else {
            debit.item
        };

        Ok(TransferOutcome {
            outbound_transaction: debit.transaction,
            inbound_transaction: credit.transaction,
            source_item,
            destination_item: credit.item,
        })
    }

    async fn validate(
        &self,
        item_id: InventoryItemId,
        request: &TransferRequest,
    ) -> Result<InventoryItem> {
        if request.quantity <= 0 {
            return Err(TransferError::Validation(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }
        if request.source_warehouse_id == request.destination_warehouse_id {
            return Err(TransferError::Validation(
                "source and destination warehouses must differ".to_string(),
            ));
        }

        let source = self.store.get_item(item_id).await?;
        if !source.is_active {
            return Err(InventoryError::ItemNotFound(item_id).into());
        }
        if source.warehouse_id != request.source_warehouse_id {
            return Err(TransferError::Validation(format!(
                "item {item_id} is not stocked in warehouse {}",
                request.source_warehouse_id
            )));
        }

        let registry = self.store.registry();
        registry.active_warehouse(request.source_warehouse_id).await?;
        registry
            .active_warehouse(request.destination_warehouse_id)
            .await?;
        if let Some(location_id) = request.source_location_id {
            registry
                .location_in(request.source_warehouse_id, location_id)
                .await?;
        }
        if let Some(location_id) = request.destination_location_id {
            registry
                .location_in(request.destination_warehouse_id, location_id)
                .await?;
        }

        Ok(source)
    }

    /// Credits the source back after the destination could not be credited.
    ///
    /// The compensating ADJUSTMENT takes the id reserved for the inbound leg,
    /// so the debit's related id points at it.
    async fn compensate(
        &self,
        debit: &StockMutation,
        inbound_id: TransactionId,
        reference: &Reference,
        request: &TransferRequest,
        step: &'static str,
        cause: InventoryError,
    ) -> TransferError {
        tracing::warn!(step, error = %cause, "transfer step failed, compensating source");

        let result = self
            .store
            .record_movement(
                debit.item.id,
                StockMovement::new(TransactionType::Adjustment, request.quantity)
                    .at(debit.transaction.location_id)
                    .with_id(inbound_id)
                    .related_to(debit.transaction.id)
                    .reference(Some(reference.clone()))
                    .reason(format!("transfer compensation: {}", cause.code()))
                    .by(request.created_by.clone()),
            )
            .await;

        match result {
            Ok(compensation) => {
                tracing::warn!(
                    step = steps::STEP_COMPENSATE_SOURCE,
                    compensating_id = %compensation.transaction.id,
                    "transfer compensated"
                );
                TransferError::Compensated {
                    source_item_id: debit.item.id,
                    quantity: request.quantity,
                    step,
                    cause,
                    compensating_transaction: Box::new(compensation.transaction),
                }
            }
            Err(compensation_error) => {
                tracing::error!(
                    step = steps::STEP_COMPENSATE_SOURCE,
                    source_item_id = %debit.item.id,
                    outbound_id = %debit.transaction.id,
                    quantity = request.quantity,
                    error = %compensation_error,
                    "transfer compensation failed"
                );
                TransferError::CompensationFailed {
                    source_item_id: debit.item.id,
                    quantity: request.quantity,
                    step,
                    cause,
                    compensation_error,
                    outbound_transaction: Box::new(debit.transaction.clone()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deserializes_from_camel_case() {
        let source = WarehouseId::new();
        let destination = WarehouseId::new();
        let json = serde_json::json!({
            "quantity": 10,
            "sourceWarehouseId": source,
            "destinationWarehouseId": destination,
        });
        let request: TransferRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.quantity, 10);
        assert_eq!(request.source_warehouse_id, source);
        assert!(request.reference.is_none());
    }
}
