//! Deterministic ledger replay.
//!
//! Replaying an item's transactions in sequence order must reproduce the
//! item's recorded quantities at every step. Integrity checks and history
//! reports are both built on this.

use chrono::{DateTime, Utc};
use common::{InventoryItemId, TransactionId};
use serde::Serialize;

use crate::{LedgerError, Result, StockTransaction, TransactionType};

/// Quantities of an item immediately after one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayPoint {
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    pub created_at: DateTime<Utc>,
    pub quantity: i64,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
}

/// The result of replaying one item's ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Replay {
    points: Vec<ReplayPoint>,
}

impl Replay {
    /// Every intermediate state, oldest first.
    pub fn points(&self) -> &[ReplayPoint] {
        &self.points
    }

    /// On-hand quantity after the last transaction.
    pub fn on_hand(&self) -> i64 {
        self.points.last().map(|p| p.on_hand).unwrap_or(0)
    }

    /// Reserved quantity after the last transaction.
    pub fn reserved(&self) -> i64 {
        self.points.last().map(|p| p.reserved).unwrap_or(0)
    }

    /// Available quantity after the last transaction.
    pub fn available(&self) -> i64 {
        self.on_hand() - self.reserved()
    }

    /// Returns the state in effect at `at`, or None if nothing had happened yet.
    pub fn state_at(&self, at: DateTime<Utc>) -> Option<&ReplayPoint> {
        self.points.iter().take_while(|p| p.created_at <= at).last()
    }

    /// Number of transactions replayed.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if no transactions were replayed.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Compares the replayed totals with the quantities held by the projection.
    pub fn reconcile(
        &self,
        item_id: InventoryItemId,
        projected_on_hand: i64,
        projected_reserved: i64,
    ) -> Reconciliation {
        Reconciliation {
            inventory_item_id: item_id,
            transactions_replayed: self.len(),
            replayed_on_hand: self.on_hand(),
            replayed_reserved: self.reserved(),
            projected_on_hand,
            projected_reserved,
            consistent: self.on_hand() == projected_on_hand
                && self.reserved() == projected_reserved,
        }
    }
}

/// Outcome of comparing a replay with the current projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub inventory_item_id: InventoryItemId,
    pub transactions_replayed: usize,
    pub replayed_on_hand: i64,
    pub replayed_reserved: i64,
    pub projected_on_hand: i64,
    pub projected_reserved: i64,
    pub consistent: bool,
}

/// Replays transactions in sequence order.
///
/// Fails if a transaction's recorded `previous_quantity` does not match the
/// running total, or if any intermediate state breaks
/// `0 <= reserved <= on_hand`.
pub fn replay(transactions: &[StockTransaction]) -> Result<Replay> {
    let mut ordered: Vec<&StockTransaction> = transactions.iter().collect();
    ordered.sort_by_key(|tx| tx.sequence);

    let mut on_hand = 0_i64;
    let mut reserved = 0_i64;
    let mut points = Vec::with_capacity(ordered.len());

    for tx in ordered {
        let tracked = if tx.transaction_type.tracks_reserved() {
            reserved
        } else {
            on_hand
        };
        if tx.previous_quantity != tracked {
            return Err(LedgerError::Discontinuity {
                transaction_id: tx.id,
                expected: tracked,
                recorded: tx.previous_quantity,
            });
        }

        on_hand += tx.on_hand_effect();
        reserved += tx.reserved_effect();

        if reserved < 0 || reserved > on_hand {
            return Err(LedgerError::InvariantViolated {
                transaction_id: tx.id,
                on_hand,
                reserved,
            });
        }

        points.push(ReplayPoint {
            transaction_id: tx.id,
            transaction_type: tx.transaction_type,
            created_at: tx.created_at,
            quantity: tx.quantity,
            on_hand,
            reserved,
            available: on_hand - reserved,
        });
    }

    Ok(Replay { points })
}
