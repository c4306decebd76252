//! Signed stock movements bucketed by time.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, DurationRound, TimeZone, Utc};
use common::{InventoryItemId, WarehouseId};
use serde::{Deserialize, Serialize};
use stock_ledger::StockTransaction;

/// Width of one bucket. Weeks start on Monday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Hour,
    #[default]
    Day,
    Week,
}

impl Bucket {
    /// Start of the bucket containing `at`.
    pub fn start_of(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Bucket::Hour => at.duration_trunc(Duration::hours(1)).unwrap_or(at),
            Bucket::Day => at.duration_trunc(Duration::days(1)).unwrap_or(at),
            Bucket::Week => {
                let date = at.date_naive()
                    - Duration::days(at.weekday().num_days_from_monday() as i64);
                Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
            }
        }
    }

    pub fn width(&self) -> Duration {
        match self {
            Bucket::Hour => Duration::hours(1),
            Bucket::Day => Duration::days(1),
            Bucket::Week => Duration::weeks(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementQuery {
    pub inventory_item_id: Option<InventoryItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    #[serde(default)]
    pub bucket: Bucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementBucket {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Sum of signed quantities per transaction type.
    pub quantities: BTreeMap<String, i64>,
    pub transaction_count: usize,
    /// Net change to on-hand stock; reservations do not move stock.
    pub net_on_hand_change: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementSeries {
    pub bucket: Bucket,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Buckets with at least one transaction, oldest first.
    pub buckets: Vec<MovementBucket>,
}

/// Groups transactions in `[from, to]` into buckets.
pub fn movement_series(
    transactions: &[StockTransaction],
    bucket: Bucket,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> MovementSeries {
    let mut buckets: BTreeMap<DateTime<Utc>, MovementBucket> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|tx| tx.created_at >= from && tx.created_at <= to)
    {
        let start = bucket.start_of(tx.created_at);
        let entry = buckets.entry(start).or_insert_with(|| MovementBucket {
            start,
            end: start + bucket.width(),
            quantities: BTreeMap::new(),
            transaction_count: 0,
            net_on_hand_change: 0,
        });
        *entry
            .quantities
            .entry(tx.transaction_type.to_string())
            .or_insert(0) += tx.quantity;
        entry.transaction_count += 1;
        entry.net_on_hand_change += tx.on_hand_effect();
    }

    MovementSeries {
        bucket,
        from,
        to,
        buckets: buckets.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn week_buckets_start_on_monday() {
        // 2024-05-16 was a Thursday.
        let at = Utc.with_ymd_and_hms(2024, 5, 16, 15, 30, 0).unwrap();
        assert_eq!(
            Bucket::Week.start_of(at),
            Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Bucket::Day.start_of(at),
            Utc.with_ymd_and_hms(2024, 5, 16, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Bucket::Hour.start_of(at),
            Utc.with_ymd_and_hms(2024, 5, 16, 15, 0, 0).unwrap()
        );
    }

    #[test]
    fn bucket_parses_from_lowercase() {
        let bucket: Bucket = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(bucket, Bucket::Week);
    }
}
