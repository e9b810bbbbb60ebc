//! History retention sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::engine::{EvictionReport, TwapEngine};
use crate::metrics::ServiceMetrics;

pub struct RetentionSweeper {
    engine: Arc<TwapEngine>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    horizon_seconds: i64,
    period: Duration,
}

impl RetentionSweeper {
    pub fn new(
        engine: Arc<TwapEngine>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ServiceMetrics>,
        horizon_seconds: i64,
        period: Duration,
    ) -> Self {
        Self {
            engine,
            clock,
            metrics,
            horizon_seconds,
            period,
        }
    }

    /// Evict everything that ended before `now - horizon`.
    pub fn sweep(&self) -> EvictionReport {
        let now = self.clock.now_seconds();
        let report = self.engine.evict_older_than(now, self.horizon_seconds);
        self.metrics.record_eviction(report.buckets, report.finalized);

        if report.buckets > 0 || report.finalized > 0 {
            info!(
                buckets = report.buckets,
                finalized = report.finalized,
                remaining = self.engine.bucket_count(),
                "Evicted intervals past retention horizon"
            );
        } else {
            debug!("Retention sweep found nothing to evict");
        }
        report
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; nothing is old enough yet.
        ticker.tick().await;

        info!(
            horizon_seconds = self.horizon_seconds,
            period_secs = self.period.as_secs(),
            "Retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Retention sweeper stopped");
    }
}
