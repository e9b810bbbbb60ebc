//! Interval Bucketer
//!
//! Assigns sampled prices to the grid interval containing them and keeps an
//! append-only snapshot list per interval. Buckets are created lazily on the
//! first snapshot and only ever removed by retention.
//!
//! Storage is a `DashMap`: appends to one interval are linearized by the
//! shard lock taken through `entry`, while different intervals proceed
//! independently.

use dashmap::DashMap;
use oracle_types::ids::{IntervalId, IntervalWidth};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::twap;

/// A single recorded price sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Fixed-point price (8 decimals).
    pub price: i64,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Whether a snapshot made it into its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Timestamp outside `[start_time, end_time)`; dropped.
    OutOfBounds,
}

/// Snapshots for one grid interval.
///
/// Invariant: every snapshot satisfies `start_time <= timestamp < end_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    snapshots: Vec<Snapshot>,
    start_time: i64,
    end_time: i64,
}

impl Bucket {
    /// Empty bucket for the interval containing `timestamp`.
    pub fn new(timestamp: i64, width: IntervalWidth) -> Self {
        let id = IntervalId::containing(timestamp, width);
        Self {
            snapshots: Vec::new(),
            start_time: id.start(),
            end_time: id.end(width),
        }
    }

    /// Append in arrival order if the timestamp lies within the bounds.
    fn push(&mut self, snapshot: Snapshot) -> RecordOutcome {
        if self.contains(snapshot.timestamp) {
            self.snapshots.push(snapshot);
            RecordOutcome::Recorded
        } else {
            RecordOutcome::OutOfBounds
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start_time && timestamp < self.end_time
    }

    /// Snapshots in arrival order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Owns every bucket, keyed by interval id.
pub struct IntervalBucketer {
    buckets: DashMap<IntervalId, Bucket>,
    width: IntervalWidth,
}

impl IntervalBucketer {
    pub fn new(width: IntervalWidth) -> Self {
        Self {
            buckets: DashMap::new(),
            width,
        }
    }

    /// Record `price` observed at `timestamp` under `interval_id`.
    ///
    /// The bucket is created on first use with bounds derived from
    /// `timestamp`; a snapshot outside those bounds is dropped so a late or
    /// early sample never lands in an interval it does not belong to.
    pub fn record_snapshot(
        &self,
        interval_id: IntervalId,
        price: i64,
        timestamp: i64,
    ) -> RecordOutcome {
        let mut bucket = self
            .buckets
            .entry(interval_id)
            .or_insert_with(|| Bucket::new(timestamp, self.width));

        let outcome = bucket.push(Snapshot { price, timestamp });
        if outcome == RecordOutcome::OutOfBounds {
            debug!(
                interval_id = %interval_id,
                timestamp,
                start_time = bucket.start_time(),
                end_time = bucket.end_time(),
                "Dropping snapshot outside interval bounds"
            );
        }
        outcome
    }

    /// Live TWAP of the current bucket state; never cached.
    pub fn compute(&self, interval_id: IntervalId) -> Option<i64> {
        self.buckets
            .get(&interval_id)
            .and_then(|bucket| twap::compute(&bucket))
    }

    /// A copy of the bucket for read-only consumers.
    pub fn snapshot_history(&self, interval_id: IntervalId) -> Option<Bucket> {
        self.buckets.get(&interval_id).map(|bucket| bucket.clone())
    }

    /// Remove every bucket with `end_time < now - horizon_seconds`.
    ///
    /// Finalization state is irrelevant here: a bucket still inside the
    /// horizon is kept whether or not it was ever settled.
    pub fn evict_older_than(&self, now: i64, horizon_seconds: i64) -> usize {
        let cutoff = now - horizon_seconds;
        let mut evicted = 0;
        self.buckets.retain(|_, bucket| {
            let keep = bucket.end_time >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn width(&self) -> IntervalWidth {
        self.width
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn bucketer() -> IntervalBucketer {
        IntervalBucketer::new(IntervalWidth::from_secs(5).unwrap())
    }

    fn id(start: i64) -> IntervalId {
        IntervalId::from_start(start)
    }

    #[test]
    fn test_creates_bucket_lazily() {
        let b = bucketer();
        assert!(b.is_empty());
        assert!(b.snapshot_history(id(10)).is_none());

        assert_eq!(b.record_snapshot(id(10), 100, 12), RecordOutcome::Recorded);

        let bucket = b.snapshot_history(id(10)).unwrap();
        assert_eq!(bucket.start_time(), 10);
        assert_eq!(bucket.end_time(), 15);
        assert_eq!(bucket.snapshots(), &[Snapshot { price: 100, timestamp: 12 }]);
    }

    #[test]
    fn test_appends_in_arrival_order() {
        let b = bucketer();
        b.record_snapshot(id(10), 200, 12);
        b.record_snapshot(id(10), 100, 10);
        b.record_snapshot(id(10), 300, 14);

        let prices: Vec<i64> = b
            .snapshot_history(id(10))
            .unwrap()
            .snapshots()
            .iter()
            .map(|s| s.price)
            .collect();
        assert_eq!(prices, vec![200, 100, 300]);
    }

    #[test]
    fn test_drops_out_of_bounds_snapshots() {
        let b = bucketer();
        b.record_snapshot(id(10), 100, 11);

        assert_eq!(b.record_snapshot(id(10), 999, 15), RecordOutcome::OutOfBounds);
        assert_eq!(b.record_snapshot(id(10), 999, 9), RecordOutcome::OutOfBounds);

        let bucket = b.snapshot_history(id(10)).unwrap();
        assert_eq!(bucket.len(), 1);
        assert!(bucket.snapshots().iter().all(|s| bucket.contains(s.timestamp)));
    }

    #[test]
    fn test_compute_reflects_live_state() {
        let b = bucketer();
        assert_eq!(b.compute(id(10)), None);

        b.record_snapshot(id(10), 100, 10);
        assert_eq!(b.compute(id(10)), Some(100));

        b.record_snapshot(id(10), 200, 12);
        b.record_snapshot(id(10), 300, 14);
        assert_eq!(b.compute(id(10)), Some(180));
    }

    #[test]
    fn test_evict_older_than() {
        let b = bucketer();
        for start in [0, 5, 10, 15, 20] {
            b.record_snapshot(id(start), 100, start);
        }

        // cutoff = 30 - 15 = 15: end_times 5 and 10 go, 15, 20, 25 stay
        let evicted = b.evict_older_than(30, 15);
        assert_eq!(evicted, 2);
        assert_eq!(b.len(), 3);
        assert!(b.snapshot_history(id(0)).is_none());
        assert!(b.snapshot_history(id(5)).is_none());
        assert!(b.snapshot_history(id(10)).is_some());
    }

    #[test]
    fn test_concurrent_appends_to_one_interval() {
        let b = Arc::new(bucketer());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let b = Arc::clone(&b);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        b.record_snapshot(id(10), worker * 1000 + i, 10 + (i % 5));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(b.snapshot_history(id(10)).unwrap().len(), 2000);
    }

    proptest! {
        #[test]
        fn eviction_keeps_exactly_the_buckets_inside_horizon(
            starts in prop::collection::btree_set(0i64..2_000, 1..60),
            now in 0i64..12_000,
            horizon in 0i64..5_000,
        ) {
            let b = bucketer();
            for start in &starts {
                let aligned = start * 5;
                b.record_snapshot(id(aligned), 1, aligned);
            }

            b.evict_older_than(now, horizon);

            for start in &starts {
                let aligned = start * 5;
                let present = b.snapshot_history(id(aligned)).is_some();
                prop_assert_eq!(present, aligned + 5 >= now - horizon);
            }
        }
    }
}
