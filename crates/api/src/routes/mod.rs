pub mod allocations;
pub mod health;
pub mod items;
pub mod metrics;
pub mod reports;
pub mod warehouses;

use stock_ledger::Reference;

use crate::error::ApiError;

/// Builds an idempotency reference from the `referenceType` and
/// `referenceNumber` request fields. The type defaults to `default_type`.
pub(crate) fn reference(
    reference_type: Option<String>,
    reference_number: Option<String>,
    default_type: &str,
) -> Result<Option<Reference>, ApiError> {
    match (reference_type, reference_number) {
        (_, None) => Ok(None),
        (_, Some(number)) if number.trim().is_empty() => Err(ApiError::BadRequest(
            "referenceNumber must not be blank".to_string(),
        )),
        (Some(kind), Some(number)) => Ok(Some(Reference::new(kind.trim(), number.trim()))),
        (None, Some(number)) => Ok(Some(Reference::new(default_type, number.trim()))),
    }
}
