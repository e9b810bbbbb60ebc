//! Finalization Cache
//!
//! Write-once store of settled TWAP values per interval. The first
//! successful computation for an interval wins and is returned unchanged by
//! every later call; the underlying bucket is never consulted again.
//!
//! Insert-if-absent runs under the `DashMap` entry lock for that key, so
//! concurrent finalizers of one interval compute at most once and readers
//! see either nothing or the settled value.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use oracle_types::ids::{IntervalId, IntervalWidth};
use tracing::debug;

#[derive(Default)]
pub struct FinalizationCache {
    finalized: DashMap<IntervalId, i64>,
}

impl FinalizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The settled value, if any. Never computes.
    pub fn get(&self, interval_id: IntervalId) -> Option<i64> {
        self.finalized.get(&interval_id).map(|v| *v)
    }

    /// Return the settled value for `interval_id`, settling it with
    /// `compute` if this is the first call that yields a value.
    ///
    /// A `None` from `compute` is not cached, so a later call may still
    /// settle the interval if data turns up.
    pub fn finalize_with<F>(&self, interval_id: IntervalId, compute: F) -> Option<i64>
    where
        F: FnOnce() -> Option<i64>,
    {
        if let Some(settled) = self.get(interval_id) {
            return Some(settled);
        }

        match self.finalized.entry(interval_id) {
            Entry::Occupied(entry) => Some(*entry.get()),
            Entry::Vacant(entry) => {
                let twap = compute()?;
                entry.insert(twap);
                debug!(interval_id = %interval_id, twap, "Interval finalized");
                Some(twap)
            }
        }
    }

    /// Drop settled values whose interval ended before `now - horizon_seconds`.
    pub fn evict_older_than(&self, now: i64, horizon_seconds: i64, width: IntervalWidth) -> usize {
        let cutoff = now - horizon_seconds;
        let mut evicted = 0;
        self.finalized.retain(|interval_id, _| {
            let keep = interval_id.end(width) >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    pub fn len(&self) -> usize {
        self.finalized.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finalized.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    fn id(start: i64) -> IntervalId {
        IntervalId::from_start(start)
    }

    #[test]
    fn test_first_value_wins() {
        let cache = FinalizationCache::new();
        assert_eq!(cache.finalize_with(id(10), || Some(180)), Some(180));
        assert_eq!(cache.finalize_with(id(10), || Some(999)), Some(180));
        assert_eq!(cache.get(id(10)), Some(180));
    }

    #[test]
    fn test_settled_value_skips_compute() {
        let cache = FinalizationCache::new();
        cache.finalize_with(id(10), || Some(180));

        let settled = cache.finalize_with(id(10), || panic!("must not recompute"));
        assert_eq!(settled, Some(180));
    }

    #[test]
    fn test_none_is_not_cached() {
        let cache = FinalizationCache::new();
        assert_eq!(cache.finalize_with(id(10), || None), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get(id(10)), None);

        // Data arriving later can still settle the interval.
        assert_eq!(cache.finalize_with(id(10), || Some(42)), Some(42));
    }

    #[test]
    fn test_concurrent_finalize_computes_once() {
        let cache = Arc::new(FinalizationCache::new());
        let computations = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));

        let handles: Vec<_> = (0..16)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                let computations = Arc::clone(&computations);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    cache.finalize_with(id(10), || {
                        computations.fetch_add(1, Ordering::SeqCst);
                        Some(1000 + worker)
                    })
                })
            })
            .collect();

        let results: Vec<Option<i64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(computations.load(Ordering::SeqCst), 1);
        let first = results[0];
        assert!(first.is_some());
        assert!(results.iter().all(|r| *r == first));
        assert_eq!(cache.get(id(10)), first);
    }

    #[test]
    fn test_evict_older_than() {
        let cache = FinalizationCache::new();
        let width = IntervalWidth::from_secs(5).unwrap();
        for start in [0, 5, 10, 15] {
            cache.finalize_with(id(start), || Some(start));
        }

        // cutoff = 12: ends 5 and 10 are older
        assert_eq!(cache.evict_older_than(20, 8, width), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(id(5)), None);
        assert_eq!(cache.get(id(10)), Some(10));
    }
}
