//! Observability counters for the TWAP oracle
//!
//! Atomic counters for ingestion, sampling, settlement and retention plus a
//! rolling tracker of how far past the boundary each settlement fired.
//! Exported as a sorted map on the health endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Core metrics for the oracle service.
pub struct ServiceMetrics {
    // Upstream ingestion
    pub ticks_received: AtomicU64,
    pub ticks_malformed: AtomicU64,
    pub upstream_reconnects: AtomicU64,

    // Sampling
    pub snapshots_recorded: AtomicU64,
    pub snapshots_out_of_bounds: AtomicU64,

    // Settlement
    pub settlements_emitted: AtomicU64,
    pub settlements_skipped: AtomicU64,
    pub settlement_drift_ms: Mutex<LatencyTracker>,

    // Retention
    pub buckets_evicted: AtomicU64,
    pub finalized_evicted: AtomicU64,

    // Fan-out
    pub messages_lagged: AtomicU64,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            ticks_received: AtomicU64::new(0),
            ticks_malformed: AtomicU64::new(0),
            upstream_reconnects: AtomicU64::new(0),
            snapshots_recorded: AtomicU64::new(0),
            snapshots_out_of_bounds: AtomicU64::new(0),
            settlements_emitted: AtomicU64::new(0),
            settlements_skipped: AtomicU64::new(0),
            settlement_drift_ms: Mutex::new(LatencyTracker::new(720)),
            buckets_evicted: AtomicU64::new(0),
            finalized_evicted: AtomicU64::new(0),
            messages_lagged: AtomicU64::new(0),
        }
    }

    pub fn record_tick(&self) {
        self.ticks_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.ticks_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.upstream_reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self) {
        self.snapshots_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_out_of_bounds(&self) {
        self.snapshots_out_of_bounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an emitted settlement and how late (ms past boundary) it fired.
    pub fn record_settlement(&self, drift_ms: u64) {
        self.settlements_emitted.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut tracker) = self.settlement_drift_ms.lock() {
            tracker.record(drift_ms);
        }
    }

    pub fn record_settlement_skipped(&self) {
        self.settlements_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, buckets: usize, finalized: usize) {
        self.buckets_evicted.fetch_add(buckets as u64, Ordering::Relaxed);
        self.finalized_evicted.fetch_add(finalized as u64, Ordering::Relaxed);
    }

    /// Record messages a lagging feed client skipped.
    pub fn record_lagged(&self, skipped: u64) {
        self.messages_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Export metrics as a BTreeMap for stable JSON ordering.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("ticks_received".to_string(), self.ticks_received.load(Ordering::Relaxed));
        m.insert("ticks_malformed".to_string(), self.ticks_malformed.load(Ordering::Relaxed));
        m.insert("upstream_reconnects".to_string(), self.upstream_reconnects.load(Ordering::Relaxed));
        m.insert("snapshots_recorded".to_string(), self.snapshots_recorded.load(Ordering::Relaxed));
        m.insert("snapshots_out_of_bounds".to_string(), self.snapshots_out_of_bounds.load(Ordering::Relaxed));
        m.insert("settlements_emitted".to_string(), self.settlements_emitted.load(Ordering::Relaxed));
        m.insert("settlements_skipped".to_string(), self.settlements_skipped.load(Ordering::Relaxed));
        m.insert("buckets_evicted".to_string(), self.buckets_evicted.load(Ordering::Relaxed));
        m.insert("finalized_evicted".to_string(), self.finalized_evicted.load(Ordering::Relaxed));
        m.insert("messages_lagged".to_string(), self.messages_lagged.load(Ordering::Relaxed));
        if let Ok(tracker) = self.settlement_drift_ms.lock() {
            if let Some(p99) = tracker.percentile(99) {
                m.insert("settlement_drift_ms_p99".to_string(), p99);
            }
            if let Some(avg) = tracker.average() {
                m.insert("settlement_drift_ms_avg".to_string(), avg);
            }
        }
        m
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling window of samples for percentile calculation.
pub struct LatencyTracker {
    samples: Vec<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a sample, evicting the oldest when full.
    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted = self.samples.clone();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    pub fn average(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u64 = self.samples.iter().sum();
        Some(sum / self.samples.len() as u64)
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
