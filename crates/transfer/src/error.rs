//! Transfer error types.

use common::InventoryItemId;
use inventory::InventoryError;
use serde_json::json;
use stock_ledger::StockTransaction;
use thiserror::Error;

/// Errors that can occur during a transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The request was rejected before anything was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A step failed before the source was debited, or the debit itself
    /// failed. Nothing was moved.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The destination could not be credited; the source was credited back.
    #[error(
        "Transfer of {quantity} from item {source_item_id} failed at {step} and was compensated: {cause}"
    )]
    Compensated {
        source_item_id: InventoryItemId,
        quantity: i64,
        step: &'static str,
        #[source]
        cause: InventoryError,
        compensating_transaction: Box<StockTransaction>,
    },

    /// The destination could not be credited and neither could the source.
    /// The debited units are recorded only in the ledger.
    #[error(
        "Transfer of {quantity} from item {source_item_id} failed at {step} ({cause}) and compensation failed: {compensation_error}"
    )]
    CompensationFailed {
        source_item_id: InventoryItemId,
        quantity: i64,
        step: &'static str,
        cause: InventoryError,
        compensation_error: InventoryError,
        outbound_transaction: Box<StockTransaction>,
    },
}

impl TransferError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation(_) => "VALIDATION_ERROR",
            TransferError::Inventory(e) => e.code(),
            TransferError::Compensated { .. } => "TRANSFER_COMPENSATED",
            TransferError::CompensationFailed { .. } => "TRANSFER_COMPENSATION_FAILED",
        }
    }

    /// Structured details for the error envelope.
    pub fn details(&self) -> serde_json::Value {
        match self {
            TransferError::Validation(_) => json!({}),
            TransferError::Inventory(e) => e.details(),
            TransferError::Compensated {
                source_item_id,
                quantity,
                step,
                cause,
                compensating_transaction,
            } => json!({
                "sourceItemId": source_item_id,
                "quantity": quantity,
                "failedStep": step,
                "cause": summary(cause),
                "compensatingTransactionId": compensating_transaction.id,
            }),
            TransferError::CompensationFailed {
                source_item_id,
                quantity,
                step,
                cause,
                compensation_error,
                outbound_transaction,
            } => json!({
                "sourceItemId": source_item_id,
                "quantity": quantity,
                "failedStep": step,
                "cause": summary(cause),
                "compensationError": summary(compensation_error),
                "outboundTransactionId": outbound_transaction.id,
            }),
        }
    }
}

/// Code, message and details of a step failure. Storage failures report
/// only their code; the text stays in the logs.
fn summary(e: &InventoryError) -> serde_json::Value {
    match e {
        InventoryError::Repository(_) => json!({ "code": e.code() }),
        _ => json!({ "code": e.code(), "message": e.to_string(), "details": e.details() }),
    }
}

/// Convenience type alias for transfer results.
pub type Result<T> = std::result::Result<T, TransferError>;
