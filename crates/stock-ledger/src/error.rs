use common::{InventoryItemId, TransactionId};
use thiserror::Error;

use crate::Sequence;

/// Errors that can occur when interacting with the stock ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Another writer appended to the item's ledger first.
    #[error(
        "Sequence conflict for item {item_id}: expected sequence {expected}, found {actual}"
    )]
    SequenceConflict {
        item_id: InventoryItemId,
        expected: Sequence,
        actual: Sequence,
    },

    /// A transaction with this ID was already written.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(TransactionId),

    /// The batch handed to `append` is malformed.
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// Replaying the ledger did not reproduce the recorded quantities.
    #[error(
        "Ledger discontinuity at transaction {transaction_id}: running total {expected}, recorded previous quantity {recorded}"
    )]
    Discontinuity {
        transaction_id: TransactionId,
        expected: i64,
        recorded: i64,
    },

    /// Replaying the ledger produced quantities that violate item invariants.
    #[error(
        "Invariant violated after transaction {transaction_id}: on hand {on_hand}, reserved {reserved}"
    )]
    InvariantViolated {
        transaction_id: TransactionId,
        on_hand: i64,
        reserved: i64,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
