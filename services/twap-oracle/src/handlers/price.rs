use axum::{extract::State, Json};
use oracle_types::tick::PriceTick;

use crate::error::AppError;
use crate::state::AppState;

pub async fn get_price(State(state): State<AppState>) -> Result<Json<PriceTick>, AppError> {
    state
        .feed
        .current_price()
        .map(Json)
        .ok_or_else(|| AppError::ServiceUnavailable("No price data available yet".into()))
}
