use std::sync::Arc;

use async_trait::async_trait;
use common::{InventoryItemId, TransactionId};
use tokio::sync::RwLock;

use crate::{
    LedgerError, Reference, Result, Sequence, StockTransaction, TransactionQuery,
    store::{AppendOptions, StockLedger, TransactionStream, validate_for_append},
};

/// In-memory stock ledger.
///
/// Behaves like the PostgreSQL ledger, including the per-item sequence
/// uniqueness that the database enforces with a constraint.
#[derive(Clone, Default)]
pub struct InMemoryStockLedger {
    transactions: Arc<RwLock<Vec<StockTransaction>>>,
}

impl InMemoryStockLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of transactions recorded.
    pub async fn transaction_count(&self) -> usize {
        self.transactions.read().await.len()
    }
}

fn current_sequence(store: &[StockTransaction], item_id: InventoryItemId) -> Sequence {
    store
        .iter()
        .filter(|tx| tx.inventory_item_id == item_id)
        .map(|tx| tx.sequence)
        .max()
        .unwrap_or(Sequence::initial())
}

#[async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn append(
        &self,
        transactions: Vec<StockTransaction>,
        options: AppendOptions,
    ) -> Result<Sequence> {
        validate_for_append(&transactions)?;

        let first = &transactions[0];
        let item_id = first.inventory_item_id;

        let mut store = self.transactions.write().await;
        let current = current_sequence(&store, item_id);

        if let Some(expected) = options.expected_sequence
            && current != expected
        {
            return Err(LedgerError::SequenceConflict {
                item_id,
                expected,
                actual: current,
            });
        }

        // Same guarantee as the unique (item, sequence) constraint
        if first.sequence <= current {
            return Err(LedgerError::SequenceConflict {
                item_id,
                expected: options.expected_sequence.unwrap_or(current),
                actual: current,
            });
        }

        if let Some(dup) = transactions
            .iter()
            .find(|new| store.iter().any(|tx| tx.id == new.id))
        {
            return Err(LedgerError::DuplicateTransaction(dup.id));
        }

        let last = transactions
            .last()
            .map(|tx| tx.sequence)
            .unwrap_or(current);
        let appended = transactions.len();
        store.extend(transactions);
        metrics::counter!("ledger_transactions_appended_total").increment(appended as u64);
        tracing::debug!(item_id = %item_id, sequence = %last, appended, "appended to ledger");

        Ok(last)
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<StockTransaction>> {
        let store = self.transactions.read().await;
        Ok(store.iter().find(|tx| tx.id == id).cloned())
    }

    async fn get_transactions_for_item(
        &self,
        item_id: InventoryItemId,
    ) -> Result<Vec<StockTransaction>> {
        let store = self.transactions.read().await;
        let mut transactions: Vec<_> = store
            .iter()
            .filter(|tx| tx.inventory_item_id == item_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|tx| tx.sequence);
        Ok(transactions)
    }

    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<StockTransaction>> {
        let store = self.transactions.read().await;
        let mut transactions: Vec<_> = store
            .iter()
            .filter(|tx| query.matches(tx))
            .cloned()
            .collect();

        transactions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.sequence.cmp(&b.sequence))
        });

        let offset = query.offset.unwrap_or(0);
        let transactions = transactions.into_iter().skip(offset);
        let transactions = match query.limit {
            Some(limit) => transactions.take(limit).collect(),
            None => transactions.collect(),
        };

        Ok(transactions)
    }

    async fn find_by_reference(&self, reference: &Reference) -> Result<Vec<StockTransaction>> {
        let store = self.transactions.read().await;
        let mut transactions: Vec<_> = store
            .iter()
            .filter(|tx| tx.has_reference(reference))
            .cloned()
            .collect();
        transactions.sort_by_key(|tx| tx.created_at);
        Ok(transactions)
    }

    async fn stream_all(&self) -> Result<TransactionStream> {
        use futures_util::stream;

        let store = self.transactions.read().await;
        let mut transactions = store.clone();
        transactions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let stream = stream::iter(transactions.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    async fn get_item_sequence(&self, item_id: InventoryItemId) -> Result<Option<Sequence>> {
        let store = self.transactions.read().await;
        Ok(store
            .iter()
            .filter(|tx| tx.inventory_item_id == item_id)
            .map(|tx| tx.sequence)
            .max())
    }
}
