//! Report types and the pure computations behind them.

pub mod history;
pub mod low_stock;
pub mod movements;
pub mod stockouts;
pub mod turnover;
pub mod valuation;

pub use history::ItemHistory;
pub use low_stock::{LowStockItem, LowStockQuery, LowStockReport, LowStockSummary};
pub use movements::{Bucket, MovementBucket, MovementQuery, MovementSeries};
pub use stockouts::{StockoutInterval, StockoutReport};
pub use turnover::{TurnoverQuery, TurnoverReport};
pub use valuation::{InventoryValueReport, ValueGroup, ValueGrouping, ValueQuery};

use chrono::{DateTime, Utc};

use crate::error::{ReportError, Result};

pub(crate) fn check_window(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
    if from >= to {
        return Err(ReportError::Validation(format!(
            "from ({from}) must be before to ({to})"
        )));
    }
    Ok(())
}
