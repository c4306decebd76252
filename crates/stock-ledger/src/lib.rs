//! Append-only stock ledger.
//!
//! Every quantity-affecting event for an inventory item is recorded here as an
//! immutable [`StockTransaction`]. Replaying an item's transactions in sequence
//! order reproduces its current on-hand and reserved quantities.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod replay;
pub mod store;
pub mod transaction;

pub use error::{LedgerError, Result};
pub use memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;
pub use query::TransactionQuery;
pub use replay::{Reconciliation, Replay, ReplayPoint, replay};
pub use store::{AppendOptions, StockLedger, StockLedgerExt, TransactionStream};
pub use transaction::{Reference, Sequence, StockTransaction, StockTransactionBuilder, TransactionType};
