//! Transfer step names, used in logs and error details.

/// Reference type recorded on both legs of a transfer.
pub const TRANSFER_REFERENCE: &str = "TRANSFER";

/// Step name: debit the source item.
pub const STEP_DEBIT_SOURCE: &str = "debit_source";

/// Step name: find or create the destination item.
pub const STEP_RESOLVE_DESTINATION: &str = "resolve_destination";

/// Step name: credit the destination item.
pub const STEP_CREDIT_DESTINATION: &str = "credit_destination";

/// Step name: credit the source item back after a failed credit.
pub const STEP_COMPENSATE_SOURCE: &str = "compensate_source";
