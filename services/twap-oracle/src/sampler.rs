//! Price Sampler
//!
//! On a fixed period, reads `CurrentPrice`, records it into the bucket of
//! the interval containing the current wall-clock second and fans the tick
//! out to price subscribers. Sampling at a fixed rate rather than per
//! upstream update keeps every bucket's snapshot density independent of how
//! chatty the upstream is.

use std::sync::Arc;
use std::time::Duration;

use oracle_types::tick::PriceTick;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::bucketer::RecordOutcome;
use crate::clock::Clock;
use crate::engine::TwapEngine;
use crate::metrics::ServiceMetrics;

pub struct PriceSampler {
    engine: Arc<TwapEngine>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    price: watch::Receiver<Option<PriceTick>>,
    ticks_tx: broadcast::Sender<PriceTick>,
    period: Duration,
}

impl PriceSampler {
    pub fn new(
        engine: Arc<TwapEngine>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ServiceMetrics>,
        price: watch::Receiver<Option<PriceTick>>,
        ticks_tx: broadcast::Sender<PriceTick>,
        period: Duration,
    ) -> Self {
        Self {
            engine,
            clock,
            metrics,
            price,
            ticks_tx,
            period,
        }
    }

    /// Take one sample. Returns `None` while no price is published, either
    /// before the first tick or while the upstream is not connected.
    pub fn sample_once(&self) -> Option<RecordOutcome> {
        let tick = (*self.price.borrow())?;
        let now = self.clock.now_seconds();

        let outcome = self.engine.record_tick(&tick, now);
        match outcome {
            RecordOutcome::Recorded => self.metrics.record_snapshot(),
            RecordOutcome::OutOfBounds => self.metrics.record_out_of_bounds(),
        }

        // No subscribers is not an error.
        let _ = self.ticks_tx.send(tick);
        Some(outcome)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_ms = self.period.as_millis() as u64, "Price sampler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.sample_once().is_none() {
                        debug!("No price yet, skipping sample");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Price sampler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use oracle_types::ids::{IntervalId, IntervalWidth};

    struct Fixture {
        sampler: PriceSampler,
        engine: Arc<TwapEngine>,
        clock: Arc<ManualClock>,
        metrics: Arc<ServiceMetrics>,
        price_tx: watch::Sender<Option<PriceTick>>,
        ticks_rx: broadcast::Receiver<PriceTick>,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(TwapEngine::new(IntervalWidth::from_secs(5).unwrap()));
        let clock = Arc::new(ManualClock::at_seconds(1_000));
        let metrics = Arc::new(ServiceMetrics::new());
        let (price_tx, price_rx) = watch::channel(None);
        let (ticks_tx, ticks_rx) = broadcast::channel(16);
        let sampler = PriceSampler::new(
            Arc::clone(&engine),
            clock.clone(),
            Arc::clone(&metrics),
            price_rx,
            ticks_tx,
            Duration::from_millis(300),
        );
        Fixture {
            sampler,
            engine,
            clock,
            metrics,
            price_tx,
            ticks_rx,
        }
    }

    fn tick(price_raw: i64, timestamp: i64) -> PriceTick {
        PriceTick {
            price_raw,
            price_usd: price_raw as f64 / 1e8,
            timestamp,
        }
    }

    #[test]
    fn test_no_sample_without_price() {
        let f = fixture();
        assert_eq!(f.sampler.sample_once(), None);
        assert_eq!(f.engine.bucket_count(), 0);
    }

    #[test]
    fn test_sample_uses_wall_clock_not_tick_time() {
        let mut f = fixture();
        // Tick carries an older timestamp than the clock.
        f.price_tx.send_replace(Some(tick(3_750_000_000, 990)));
        f.clock.set_seconds(1_002);

        assert_eq!(f.sampler.sample_once(), Some(RecordOutcome::Recorded));

        let report = f.engine.get_twap(IntervalId::from_start(1_000)).unwrap();
        assert_eq!(report.twap, 3_750_000_000);
        assert_eq!(report.history.unwrap().snapshots()[0].timestamp, 1_002);

        assert_eq!(f.ticks_rx.try_recv().unwrap().price_raw, 3_750_000_000);
        assert_eq!(f.metrics.export()["snapshots_recorded"], 1);
    }

    #[test]
    fn test_repeated_samples_fill_bucket() {
        let f = fixture();
        f.price_tx.send_replace(Some(tick(100, 1_000)));
        f.sampler.sample_once();
        f.clock.advance_millis(2_000);
        f.price_tx.send_replace(Some(tick(200, 1_002)));
        f.sampler.sample_once();
        f.clock.advance_millis(2_000);
        f.price_tx.send_replace(Some(tick(300, 1_004)));
        f.sampler.sample_once();

        assert_eq!(f.engine.finalize(IntervalId::from_start(1_000)), Some(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let f = fixture();
        f.price_tx.send_replace(Some(tick(100, 1_000)));
        let engine = Arc::clone(&f.engine);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(f.sampler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        shutdown_tx.send_replace(true);
        handle.await.unwrap();

        let history = engine.get_twap(IntervalId::from_start(1_000)).unwrap().history.unwrap();
        assert!(history.len() >= 3);
    }
}
