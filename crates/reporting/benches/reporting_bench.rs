use chrono::{Duration, Utc};
use common::{InventoryItemId, TransactionId};
use criterion::{Criterion, criterion_group, criterion_main};
use reporting::reports::stockouts::stockouts;
use stock_ledger::{ReplayPoint, TransactionType};

/// Alternating stocked/empty history, one step per minute.
fn history(n: usize) -> Vec<ReplayPoint> {
    let start = Utc::now() - Duration::days(7);
    (0..n)
        .map(|i| {
            let on_hand = if i % 2 == 0 { 10 } else { 0 };
            ReplayPoint {
                transaction_id: TransactionId::new(),
                transaction_type: TransactionType::Adjustment,
                created_at: start + Duration::minutes(i as i64),
                quantity: 0,
                on_hand,
                reserved: 0,
                available: on_hand,
            }
        })
        .collect()
}

fn bench_stockouts_10k(c: &mut Criterion) {
    let points = history(10_000);
    let from = points[0].created_at;
    let to = from + Duration::days(7);
    let item = InventoryItemId::new();

    c.bench_function("reporting/stockouts_10k_points", |b| {
        b.iter(|| {
            let report = stockouts(item, &points, from, to);
            assert_eq!(report.stockout_count, 5_000);
        });
    });
}

criterion_group!(benches, bench_stockouts_10k);
criterion_main!(benches);
