//! Periods during which nothing was available.

use chrono::{DateTime, Utc};
use common::InventoryItemId;
use serde::Serialize;
use stock_ledger::ReplayPoint;

use crate::timeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockoutInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_seconds: i64,
    /// The item was still out of stock when the window closed.
    pub ongoing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockoutReport {
    pub inventory_item_id: InventoryItemId,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub intervals: Vec<StockoutInterval>,
    pub stockout_count: usize,
    pub total_duration_seconds: i64,
}

/// Finds the spans in `[from, to)` where available stock was zero.
pub fn stockouts(
    item_id: InventoryItemId,
    points: &[ReplayPoint],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> StockoutReport {
    let segments = timeline::segments(points, from, to, |p| p.available);
    let intervals: Vec<StockoutInterval> = timeline::empty_spans(&segments)
        .into_iter()
        .map(|(start, end)| StockoutInterval {
            start,
            end,
            duration_seconds: (end - start).num_seconds(),
            ongoing: end == to,
        })
        .collect();

    StockoutReport {
        inventory_item_id: item_id,
        from,
        to,
        stockout_count: intervals.len(),
        total_duration_seconds: intervals.iter().map(|i| i.duration_seconds).sum(),
        intervals,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::TransactionId;
    use stock_ledger::TransactionType;

    fn point(at: DateTime<Utc>, on_hand: i64, reserved: i64) -> ReplayPoint {
        ReplayPoint {
            transaction_id: TransactionId::new(),
            transaction_type: TransactionType::Adjustment,
            created_at: at,
            quantity: 0,
            on_hand,
            reserved,
            available: on_hand - reserved,
        }
    }

    #[test]
    fn fully_reserved_stock_counts_as_stockout() {
        let t0 = Utc::now() - Duration::days(1);
        let points = vec![
            point(t0, 10, 0),
            point(t0 + Duration::hours(2), 10, 10),
            point(t0 + Duration::hours(5), 10, 4),
        ];

        let report = stockouts(InventoryItemId::new(), &points, t0, t0 + Duration::hours(8));
        assert_eq!(report.stockout_count, 1);
        assert_eq!(report.total_duration_seconds, 3 * 3600);
        assert!(!report.intervals[0].ongoing);
    }

    #[test]
    fn stockout_running_at_window_end_is_ongoing() {
        let t0 = Utc::now() - Duration::days(1);
        let points = vec![point(t0, 5, 0), point(t0 + Duration::hours(1), 0, 0)];

        let report = stockouts(InventoryItemId::new(), &points, t0, t0 + Duration::hours(3));
        assert_eq!(report.intervals.len(), 1);
        assert!(report.intervals[0].ongoing);
        assert_eq!(report.intervals[0].duration_seconds, 2 * 3600);
    }
}
