//! Read-only reports over inventory items and the stock ledger.
//!
//! Nothing in this crate writes. Reports are computed on demand from the
//! current item projection and from ledger replay:
//! - low stock with suggested reorder quantities
//! - inventory value grouped by warehouse or category
//! - bucketed stock movement series
//! - turnover over a period
//! - stockout intervals
//! - per-item quantity history

pub mod aggregator;
pub mod error;
pub mod reports;
mod timeline;

pub use aggregator::ReportingAggregator;
pub use error::{ReportError, Result};
pub use reports::{
    Bucket, InventoryValueReport, ItemHistory, LowStockItem, LowStockQuery, LowStockReport,
    LowStockSummary, MovementBucket, MovementQuery, MovementSeries, StockoutInterval,
    StockoutReport, TurnoverQuery, TurnoverReport, ValueGroup, ValueGrouping, ValueQuery,
};
