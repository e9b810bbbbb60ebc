//! Aggregation engine
//!
//! Ties the Interval Bucketer, TWAP Calculator and Finalization Cache
//! together behind the operations the timer tasks and HTTP handlers use.
//!
//! ```text
//!  sampled tick ──▶ record_snapshot ──▶ IntervalBucketer
//!                                            │
//!  scheduler ──▶ finalize ──▶ FinalizationCache ◀─┘ (compute once)
//!                                            │
//!  query ──▶ get_twap ──▶ cached ▸ live ▸ not found
//! ```

use oracle_types::ids::{IntervalId, IntervalWidth};
use oracle_types::numeric::FixedPrice;
use oracle_types::tick::PriceTick;

use crate::bucketer::{IntervalBucketer, RecordOutcome};
use crate::events::TwapReport;
use crate::finalization::FinalizationCache;

/// Counts removed by one retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub buckets: usize,
    pub finalized: usize,
}

pub struct TwapEngine {
    bucketer: IntervalBucketer,
    cache: FinalizationCache,
}

impl TwapEngine {
    pub fn new(width: IntervalWidth) -> Self {
        Self {
            bucketer: IntervalBucketer::new(width),
            cache: FinalizationCache::new(),
        }
    }

    pub fn width(&self) -> IntervalWidth {
        self.bucketer.width()
    }

    /// Append a snapshot to `interval_id`'s bucket (see `IntervalBucketer`).
    pub fn record_snapshot(&self, interval_id: IntervalId, price: i64, timestamp: i64) -> RecordOutcome {
        self.bucketer.record_snapshot(interval_id, price, timestamp)
    }

    /// Sample `tick` at wall-clock second `now` into the interval containing `now`.
    pub fn record_tick(&self, tick: &PriceTick, now: i64) -> RecordOutcome {
        let interval_id = IntervalId::containing(now, self.width());
        self.record_snapshot(interval_id, tick.price_raw, now)
    }

    /// Settle `interval_id` exactly once; later calls return the settled value.
    pub fn finalize(&self, interval_id: IntervalId) -> Option<i64> {
        self.cache
            .finalize_with(interval_id, || self.bucketer.compute(interval_id))
    }

    /// The settled value only.
    pub fn finalized(&self, interval_id: IntervalId) -> Option<i64> {
        self.cache.get(interval_id)
    }

    /// Settled value if present, else a live uncached computation, else `None`.
    pub fn get_twap(&self, interval_id: IntervalId) -> Option<TwapReport> {
        let (twap, finalized) = match self.cache.get(interval_id) {
            Some(settled) => (settled, true),
            None => (self.bucketer.compute(interval_id)?, false),
        };

        Some(TwapReport {
            timeperiod_id: interval_id,
            twap,
            twap_usd: FixedPrice::from_raw(twap).usd_string(),
            finalized,
            history: self.bucketer.snapshot_history(interval_id),
        })
    }

    /// Apply the retention horizon to buckets and settled values alike.
    pub fn evict_older_than(&self, now: i64, horizon_seconds: i64) -> EvictionReport {
        let buckets = self.bucketer.evict_older_than(now, horizon_seconds);
        let finalized = self
            .cache
            .evict_older_than(now, horizon_seconds, self.width());
        EvictionReport { buckets, finalized }
    }

    pub fn bucket_count(&self) -> usize {
        self.bucketer.len()
    }

    pub fn finalized_count(&self) -> usize {
        self.cache.len()
    }
}
