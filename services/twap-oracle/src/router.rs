use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, price, twap, ws};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/price", get(price::get_price))
        .route("/twap/:interval_id", get(twap::get_twap));

    let ws_routes = Router::new()
        .route("/prices", get(ws::ws_prices))
        .route("/settlements", get(ws::ws_settlements));

    Router::new()
        .route("/", get(health::health))
        .nest("/api", api_routes)
        .nest("/ws", ws_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
