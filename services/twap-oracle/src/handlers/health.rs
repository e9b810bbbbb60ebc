use std::collections::BTreeMap;

use axum::{extract::State, Json};
use oracle_types::tick::PriceTick;
use serde::Serialize;

use crate::feed::ConnectionState;
use crate::state::AppState;
use crate::websocket::Channel;

pub const SERVICE_NAME: &str = "twap-oracle";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub connected_to_upstream: bool,
    pub connection_state: ConnectionState,
    pub price_clients: usize,
    pub settlement_clients: usize,
    pub current_price: Option<PriceTick>,
    pub buckets: usize,
    pub finalized: usize,
    pub metrics: BTreeMap<String, u64>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connection_state = state.feed.connection_state();
    let (price_clients, settlement_clients) = {
        let registry = state.registry();
        (
            registry.client_count(Channel::Prices),
            registry.client_count(Channel::Settlements),
        )
    };

    Json(HealthResponse {
        status: "ok",
        service: SERVICE_NAME,
        version: crate::SERVICE_VERSION,
        uptime_secs: state.started_at.elapsed().as_secs(),
        connected_to_upstream: connection_state.is_connected(),
        connection_state,
        price_clients,
        settlement_clients,
        current_price: state.feed.current_price(),
        buckets: state.engine.bucket_count(),
        finalized: state.engine.finalized_count(),
        metrics: state.metrics.export(),
    })
}
