//! Stock transfers between warehouses.
//!
//! A transfer moves units of one SKU from an item in the source warehouse to
//! the item stocking the same SKU in the destination warehouse:
//! 1. Debit the source (TRANSFER_OUT)
//! 2. Resolve or create the destination item
//! 3. Credit the destination (TRANSFER_IN)
//!
//! The two items are separate rows written one after the other. If the credit
//! fails after the debit succeeded, the source is credited back with a
//! compensating ADJUSTMENT and the caller receives
//! [`TransferError::Compensated`] rather than a success.

pub mod coordinator;
pub mod error;
pub mod steps;

pub use coordinator::{TransferCoordinator, TransferOutcome, TransferRequest};
pub use error::{Result, TransferError};
