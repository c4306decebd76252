//! Report error types.

use common::InventoryItemId;
use inventory::RepositoryError;
use stock_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur while building a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report parameters were rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Inventory item not found: {0}")]
    ItemNotFound(InventoryItemId),

    /// Reading items or warehouses failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Reading or replaying the ledger failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ReportError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::Validation(_) => "VALIDATION_ERROR",
            ReportError::ItemNotFound(_) => "INVENTORY_ITEM_NOT_FOUND",
            ReportError::Repository(_) | ReportError::Ledger(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
