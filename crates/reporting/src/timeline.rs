//! Piecewise-constant quantity timelines built from replay points.

use chrono::{DateTime, Utc};
use stock_ledger::ReplayPoint;

/// A span of time over which a quantity held one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: i64,
}

impl Segment {
    pub fn seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// Splits `[from, to)` into segments of constant `value(point)`.
///
/// Before the first point the quantity is zero. Points must be in ledger
/// order.
pub(crate) fn segments(
    points: &[ReplayPoint],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    value: impl Fn(&ReplayPoint) -> i64,
) -> Vec<Segment> {
    if from >= to {
        return Vec::new();
    }

    let mut current = points
        .iter()
        .take_while(|p| p.created_at <= from)
        .last()
        .map(|p| value(p))
        .unwrap_or(0);
    let mut start = from;
    let mut out = Vec::new();

    for point in points
        .iter()
        .filter(|p| p.created_at > from && p.created_at < to)
    {
        let next = value(point);
        if next == current {
            continue;
        }
        if point.created_at > start {
            out.push(Segment {
                start,
                end: point.created_at,
                value: current,
            });
        }
        start = point.created_at;
        current = next;
    }
    out.push(Segment {
        start,
        end: to,
        value: current,
    });
    out
}

/// Time-weighted mean of the segments' values.
pub(crate) fn time_weighted_mean(segments: &[Segment]) -> f64 {
    let total: i64 = segments.iter().map(Segment::seconds).sum();
    if total <= 0 {
        return segments.last().map(|s| s.value as f64).unwrap_or(0.0);
    }
    let weighted: f64 = segments
        .iter()
        .map(|s| s.value as f64 * s.seconds() as f64)
        .sum();
    weighted / total as f64
}

/// Maximal spans over which the value was zero or below.
pub(crate) fn empty_spans(segments: &[Segment]) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut spans: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for segment in segments.iter().filter(|s| s.value <= 0) {
        match spans.last_mut() {
            Some(last) if last.1 == segment.start => last.1 = segment.end,
            _ => spans.push((segment.start, segment.end)),
        }
    }
    spans
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
    fn quantity_is_zero_before_first_point() {
        let t0 = Utc::now();
        let points = vec![point(t0 + Duration::hours(1), 10, 0)];

        let segs = segments(&points, t0, t0 + Duration::hours(2), |p| p.on_hand);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].value, 0);
        assert_eq!(segs[1].value, 10);
        assert_eq!(time_weighted_mean(&segs), 5.0);
    }

    #[test]
    fn state_at_window_start_carries_in() {
        let t0 = Utc::now();
        let points = vec![point(t0 - Duration::hours(1), 8, 0)];

        let segs = segments(&points, t0, t0 + Duration::hours(1), |p| p.on_hand);
        assert_eq!(segs, vec![Segment { start: t0, end: t0 + Duration::hours(1), value: 8 }]);
    }

    #[test]
    fn adjacent_empty_segments_merge() {
        let t0 = Utc::now();
        let points = vec![
            point(t0 + Duration::minutes(10), 5, 0),
            point(t0 + Duration::minutes(20), 5, 5),
            point(t0 + Duration::minutes(30), 0, 0),
            point(t0 + Duration::minutes(40), 3, 0),
        ];

        let segs = segments(&points, t0, t0 + Duration::minutes(60), |p| p.available);
        let spans = empty_spans(&segs);
        assert_eq!(
            spans,
            vec![
                (t0, t0 + Duration::minutes(10)),
                (t0 + Duration::minutes(20), t0 + Duration::minutes(40)),
            ]
        );
    }

    #[test]
    fn empty_window_has_no_segments() {
        let t0 = Utc::now();
        assert!(segments(&[], t0, t0, |p| p.on_hand).is_empty());
    }
}
