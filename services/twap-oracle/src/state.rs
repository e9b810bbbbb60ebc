use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use oracle_types::tick::PriceTick;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::engine::TwapEngine;
use crate::events::Settlement;
use crate::feed::FeedHandle;
use crate::metrics::ServiceMetrics;
use crate::websocket::{ClientRegistry, WsConfig};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<TwapEngine>,
    pub metrics: Arc<ServiceMetrics>,
    pub clock: Arc<dyn Clock>,
    pub feed: FeedHandle,
    pub ticks_tx: broadcast::Sender<PriceTick>,
    pub settlements_tx: broadcast::Sender<Settlement>,
    pub registry: Arc<Mutex<ClientRegistry>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        engine: Arc<TwapEngine>,
        metrics: Arc<ServiceMetrics>,
        clock: Arc<dyn Clock>,
        feed: FeedHandle,
        ws: &WsConfig,
    ) -> Self {
        let (ticks_tx, _) = broadcast::channel(ws.broadcast_capacity);
        let (settlements_tx, _) = broadcast::channel(ws.broadcast_capacity);
        Self {
            engine,
            metrics,
            clock,
            feed,
            ticks_tx,
            settlements_tx,
            registry: Arc::new(Mutex::new(ClientRegistry::new())),
            started_at: Instant::now(),
        }
    }

    /// The registry only holds counters, so a poisoned lock is still usable.
    pub fn registry(&self) -> MutexGuard<'_, ClientRegistry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
