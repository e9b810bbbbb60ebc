//! Process assembly: builds every component from an `OracleConfig` and
//! spawns the background loops.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::config::OracleConfig;
use crate::engine::TwapEngine;
use crate::feed::FeedSupervisor;
use crate::metrics::ServiceMetrics;
use crate::retention::RetentionSweeper;
use crate::router::create_router;
use crate::sampler::PriceSampler;
use crate::scheduler::SettlementScheduler;
use crate::state::AppState;
use crate::websocket::WsConfig;

pub struct Oracle {
    state: AppState,
    supervisor: FeedSupervisor,
    sampler: PriceSampler,
    scheduler: SettlementScheduler,
    sweeper: RetentionSweeper,
}

impl Oracle {
    pub fn new(config: &OracleConfig, clock: Arc<dyn Clock>) -> Self {
        let engine = Arc::new(TwapEngine::new(config.grid_width));
        let metrics = Arc::new(ServiceMetrics::new());

        let (supervisor, feed) =
            FeedSupervisor::new(config.feed.clone(), Arc::clone(&clock), Arc::clone(&metrics));

        let state = AppState::new(
            Arc::clone(&engine),
            Arc::clone(&metrics),
            Arc::clone(&clock),
            feed.clone(),
            &WsConfig::default(),
        );

        let sampler = PriceSampler::new(
            Arc::clone(&engine),
            Arc::clone(&clock),
            Arc::clone(&metrics),
            feed.price,
            state.ticks_tx.clone(),
            config.sample_period,
        );
        let scheduler = SettlementScheduler::new(
            Arc::clone(&engine),
            Arc::clone(&clock),
            Arc::clone(&metrics),
            state.settlements_tx.clone(),
        );
        let sweeper = RetentionSweeper::new(
            engine,
            clock,
            metrics,
            config.retention_horizon_seconds,
            config.retention_sweep,
        );

        Self {
            state,
            supervisor,
            sampler,
            scheduler,
            sweeper,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Spawn the feed, sampler, scheduler and retention loops. All stop when
    /// `shutdown` flips to `true`.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(self.supervisor.run(shutdown.clone())),
            tokio::spawn(self.sampler.run(shutdown.clone())),
            tokio::spawn(self.scheduler.run(shutdown.clone())),
            tokio::spawn(self.sweeper.run(shutdown)),
        ]
    }
}
