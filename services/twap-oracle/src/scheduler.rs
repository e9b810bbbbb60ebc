//! Settlement Scheduler
//!
//! Fires once per grid interval, just after each wall-clock boundary, and
//! settles the interval that boundary closed.
//!
//! ```text
//!   t = 15.003s ─▶ current boundary 15 ─▶ settle [10, 15) ─▶ publish
//!   t = 20.001s ─▶ current boundary 20 ─▶ settle [15, 20) ─▶ publish
//! ```
//!
//! The settled id is always derived from the clock at fire time. Each sleep
//! is recomputed from the clock, so timer drift never accumulates.

use std::sync::Arc;
use std::time::Duration;

use oracle_types::ids::{IntervalId, IntervalWidth};
use oracle_types::numeric::FixedPrice;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::TwapEngine;
use crate::events::Settlement;
use crate::metrics::ServiceMetrics;

/// Time until the next boundary strictly after `now_millis`.
///
/// Exactly on a boundary waits a full width.
pub fn delay_until_next_boundary(now_millis: i64, width: IntervalWidth) -> Duration {
    let width_ms = width.as_millis();
    let remaining = width_ms - now_millis.rem_euclid(width_ms);
    Duration::from_millis(remaining as u64)
}

/// The interval that closed at the most recent boundary at or before `now`.
pub fn grid_to_settle(now_seconds: i64, width: IntervalWidth) -> IntervalId {
    IntervalId::containing(now_seconds, width).previous(width)
}

pub struct SettlementScheduler {
    engine: Arc<TwapEngine>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    settlements_tx: broadcast::Sender<Settlement>,
    last_settled: Option<IntervalId>,
}

impl SettlementScheduler {
    pub fn new(
        engine: Arc<TwapEngine>,
        clock: Arc<dyn Clock>,
        metrics: Arc<ServiceMetrics>,
        settlements_tx: broadcast::Sender<Settlement>,
    ) -> Self {
        Self {
            engine,
            clock,
            metrics,
            settlements_tx,
            last_settled: None,
        }
    }

    pub fn last_settled(&self) -> Option<IntervalId> {
        self.last_settled
    }

    /// Settle the interval that closed at the boundary preceding `now_millis`.
    ///
    /// Returns the published settlement, or `None` when the interval was
    /// already handled or has no data.
    pub fn on_boundary(&mut self, now_millis: i64) -> Option<Settlement> {
        let width = self.engine.width();
        let now_seconds = now_millis.div_euclid(1000);
        let target = grid_to_settle(now_seconds, width);

        if let Some(last) = self.last_settled {
            if target <= last {
                debug!(
                    interval_id = %target,
                    last_settled = %last,
                    "Interval already handled, not re-emitting"
                );
                return None;
            }
            let skipped = (target.start() - last.start()) / width.as_secs() - 1;
            if skipped > 0 {
                warn!(
                    skipped,
                    from = %last,
                    to = %target,
                    "Scheduler fell behind, intervals were not settled"
                );
            }
        }
        self.last_settled = Some(target);

        let Some(twap) = self.engine.finalize(target) else {
            self.metrics.record_settlement_skipped();
            debug!(interval_id = %target, "No data for interval, nothing to settle");
            return None;
        };

        let settlement = Settlement {
            interval_id: target,
            twap: FixedPrice::from_raw(twap),
            emitted_at: now_seconds,
        };

        let boundary_ms = target.end(width).saturating_mul(1000);
        let drift_ms = now_millis.saturating_sub(boundary_ms).max(0) as u64;
        self.metrics.record_settlement(drift_ms);

        info!(
            interval_id = %target,
            twap,
            twap_usd = %settlement.twap.usd_string(),
            drift_ms,
            "Settlement emitted"
        );

        // No subscribers is not an error.
        let _ = self.settlements_tx.send(settlement);
        Some(settlement)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let width = self.engine.width();
        info!(width = %width, "Settlement scheduler started");

        loop {
            let delay = delay_until_next_boundary(self.clock.now_millis(), width);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let now = self.clock.now_millis();
                    self.on_boundary(now);
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Settlement scheduler stopped");
    }
}
