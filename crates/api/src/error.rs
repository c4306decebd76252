//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inventory::InventoryError;
use reporting::ReportError;
use serde_json::json;
use thiserror::Error;
use transfer::TransferError;

/// API-level error type that maps to the failure envelope
/// `{success: false, error: {code, message, details}}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: bad JSON, path or query parameters.
    #[error("{0}")]
    BadRequest(String),

    /// The caller's role may not perform the operation.
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "VALIDATION_ERROR",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Inventory(e) => e.code(),
            ApiError::Transfer(e) => e.code(),
            ApiError::Report(e) => e.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Inventory(e) => inventory_status(e),
            ApiError::Transfer(e) => match e {
                TransferError::Validation(_) => StatusCode::BAD_REQUEST,
                TransferError::Inventory(e) => inventory_status(e),
                TransferError::Compensated { .. } => StatusCode::CONFLICT,
                TransferError::CompensationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Report(e) => match e {
                ReportError::Validation(_) => StatusCode::BAD_REQUEST,
                ReportError::ItemNotFound(_) => StatusCode::NOT_FOUND,
                ReportError::Repository(_) | ReportError::Ledger(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            ApiError::BadRequest(_) | ApiError::Forbidden(_) => json!({}),
            ApiError::Inventory(e) => e.details(),
            ApiError::Transfer(e) => e.details(),
            ApiError::Report(ReportError::ItemNotFound(id)) => json!({ "inventoryItemId": id }),
            ApiError::Report(_) => json!({}),
        }
    }
}

fn inventory_status(err: &InventoryError) -> StatusCode {
    match err {
        InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
        InventoryError::ItemNotFound(_)
        | InventoryError::ItemNotStocked { .. }
        | InventoryError::WarehouseNotFound(_)
        | InventoryError::ZoneNotFound(_)
        | InventoryError::LocationNotFound(_)
        | InventoryError::AllocationNotFound(_) => StatusCode::NOT_FOUND,
        InventoryError::InsufficientStock { .. }
        | InventoryError::InsufficientLocationStock { .. }
        | InventoryError::InsufficientReservedStock { .. }
        | InventoryError::LocationCapacityExceeded { .. }
        | InventoryError::InvalidStatusTransition { .. }
        | InventoryError::ItemInUse { .. }
        | InventoryError::DuplicateItem { .. }
        | InventoryError::DuplicateAllocation { .. }
        | InventoryError::DuplicateWarehouseCode(_)
        | InventoryError::ConcurrencyExhausted { .. } => StatusCode::CONFLICT,
        InventoryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "internal server error");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }

        // Server-side failures are not echoed back to the caller.
        let message = if status.is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
                "details": self.details(),
            },
        });
        (status, axum::Json(body)).into_response()
    }
}
