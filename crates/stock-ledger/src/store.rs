use std::pin::Pin;

use async_trait::async_trait;
use common::{InventoryItemId, TransactionId};
use futures_core::Stream;

use crate::{
    LedgerError, Reference, Replay, Result, Sequence, StockTransaction, TransactionQuery, replay,
};

/// Options for appending transactions to the ledger.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected sequence of the item's ledger before the append.
    /// If None, no sequence check is performed (use with caution).
    pub expected_sequence: Option<Sequence>,
}

impl AppendOptions {
    /// Creates options with no sequence check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the item's ledger to be at `sequence`.
    pub fn expect_sequence(sequence: Sequence) -> Self {
        Self {
            expected_sequence: Some(sequence),
        }
    }

    /// Creates options expecting the item to have no transactions yet.
    pub fn expect_empty() -> Self {
        Self {
            expected_sequence: Some(Sequence::initial()),
        }
    }
}

/// A stream of ledger transactions.
pub type TransactionStream = Pin<Box<dyn Stream<Item = Result<StockTransaction>> + Send>>;

/// Core trait for stock ledger implementations.
///
/// The ledger is append-only: there is no update or delete. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Appends transactions for a single item.
    ///
    /// Transactions are appended atomically - either all succeed or none do.
    /// If `options.expected_sequence` is set, the operation fails with
    /// `SequenceConflict` if the item's current sequence doesn't match.
    ///
    /// Returns the item's sequence after appending.
    async fn append(
        &self,
        transactions: Vec<StockTransaction>,
        options: AppendOptions,
    ) -> Result<Sequence>;

    /// Retrieves a single transaction by ID.
    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>>;

    /// Retrieves all transactions for an item in sequence order.
    async fn get_transactions_for_item(
        &self,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockTransaction>>;

    /// Retrieves transactions matching a query, ordered by creation time.
    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<StockTransaction>>;

    /// Retrieves every transaction recorded against an external reference.
    async fn find_by_reference(&self, reference: &Reference) -> Result<Vec<StockTransaction>>;

    /// Streams all transactions in creation order.
    async fn stream_all(&self) -> Result<TransactionStream>;

    /// Gets the current ledger sequence of an item.
    ///
    /// Returns None if the item has no transactions.
    async fn get_item_sequence(&self, item_id: InventoryItemId) -> Result<Option<Sequence>>;
}

/// Extension trait providing convenience methods for ledgers.
#[async_trait]
pub trait StockLedgerExt: StockLedger {
    /// Appends a single transaction.
    async fn append_one(
        &self,
        transaction: StockTransaction,
        options: AppendOptions,
    ) -> Result<Sequence> {
        self.append(vec![transaction], options).await
    }

    /// Follows `related_transaction_id` from a transaction to its paired leg.
    ///
    /// Returns None if the transaction doesn't exist, has no link, or the
    /// linked transaction was never written.
    async fn get_related(&self, id: TransactionId) -> Result<Option<StockTransaction>> {
        let Some(tx) = self.get_transaction(id).await? else {
            return Ok(None);
        };
        match tx.related_transaction_id {
            Some(related) => self.get_transaction(related).await,
            None => Ok(None),
        }
    }

    /// Replays an item's ledger from the beginning.
    async fn replay_item(&self, item_id: InventoryItemId) -> Result<Replay> {
        let transactions = self.get_transactions_for_item(item_id).await?;
        replay(&transactions)
    }
}

// Blanket implementation for all StockLedger implementations
impl<T: StockLedger + ?Sized> StockLedgerExt for T {}

/// Validates a batch before appending.
///
/// All transactions must belong to the same item, carry consecutive
/// sequences, respect the sign convention of their type, and record
/// `new_quantity = previous_quantity + effect` on the tracked quantity.
pub fn validate_for_append(transactions: &[StockTransaction]) -> Result<()> {
    let Some(first) = transactions.first() else {
        return Err(LedgerError::InvalidAppend(
            "Cannot append empty transaction list".to_string(),
        ));
    };

    let mut expected_sequence = first.sequence;
    for (index, tx) in transactions.iter().enumerate() {
        if tx.inventory_item_id != first.inventory_item_id {
            return Err(LedgerError::InvalidAppend(
                "All transactions must be for the same item".to_string(),
            ));
        }
        if index > 0 {
            expected_sequence = expected_sequence.next();
            if tx.sequence != expected_sequence {
                return Err(LedgerError::InvalidAppend(format!(
                    "Transaction sequences must be consecutive. Expected {}, got {}",
                    expected_sequence, tx.sequence
                )));
            }
        }
        if !tx.transaction_type.accepts_quantity(tx.quantity) {
            return Err(LedgerError::InvalidAppend(format!(
                "Quantity {} has the wrong sign for {}",
                tx.quantity, tx.transaction_type
            )));
        }
        let effect = if tx.transaction_type.tracks_reserved() {
            tx.reserved_effect()
        } else {
            tx.on_hand_effect()
        };
        if tx.previous_quantity + effect != tx.new_quantity {
            return Err(LedgerError::InvalidAppend(format!(
                "Transaction {} records {} -> {} for a change of {}",
                tx.id, tx.previous_quantity, tx.new_quantity, effect
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionType;
    use common::WarehouseId;

    fn tx(
        item: InventoryItemId,
        sequence: i64,
        transaction_type: TransactionType,
        quantity: i64,
        previous: i64,
    ) -> StockTransaction {
        let effect = if transaction_type.tracks_reserved() {
            transaction_type.reserved_effect(quantity)
        } else {
            transaction_type.on_hand_effect(quantity)
        };
        StockTransaction::builder()
            .transaction_type(transaction_type)
            .inventory_item_id(item)
            .sequence(Sequence::new(sequence))
            .quantity(quantity)
            .warehouse_id(WarehouseId::new())
            .quantities(previous, previous + effect)
            .build()
            .unwrap()
    }

    #[test]
    fn rejects_empty_batch() {
        assert!(matches!(
            validate_for_append(&[]),
            Err(LedgerError::InvalidAppend(_))
        ));
    }

    #[test]
    fn rejects_mixed_items() {
        let batch = vec![
            tx(InventoryItemId::new(), 1, TransactionType::Receipt, 5, 0),
            tx(InventoryItemId::new(), 2, TransactionType::Receipt, 5, 5),
        ];
        assert!(validate_for_append(&batch).is_err());
    }

    #[test]
    fn rejects_gaps_in_sequence() {
        let item = InventoryItemId::new();
        let batch = vec![
            tx(item, 1, TransactionType::Receipt, 5, 0),
            tx(item, 3, TransactionType::Receipt, 5, 5),
        ];
        assert!(validate_for_append(&batch).is_err());
    }

    #[test]
    fn rejects_wrong_sign() {
        let item = InventoryItemId::new();
        let mut bad = tx(item, 1, TransactionType::Receipt, 5, 0);
        bad.quantity = -5;
        bad.new_quantity = -5;
        assert!(validate_for_append(&[bad]).is_err());
    }

    #[test]
    fn rejects_inconsistent_quantities() {
        let item = InventoryItemId::new();
        let mut bad = tx(item, 1, TransactionType::Receipt, 5, 0);
        bad.new_quantity = 6;
        assert!(validate_for_append(&[bad]).is_err());
    }

    #[test]
    fn accepts_release_then_reserve_pair() {
        let item = InventoryItemId::new();
        let batch = vec![
            tx(item, 4, TransactionType::ReservationRelease, -3, 3),
            tx(item, 5, TransactionType::Reservation, 5, 0),
        ];
        assert!(validate_for_append(&batch).is_ok());
    }
}
