use axum::{
    extract::{Path, State},
    Json,
};
use oracle_types::ids::IntervalId;

use crate::error::AppError;
use crate::events::TwapReport;
use crate::state::AppState;

/// Settled value if cached, else a live computation, else 404.
pub async fn get_twap(
    State(state): State<AppState>,
    Path(interval_id): Path<String>,
) -> Result<Json<TwapReport>, AppError> {
    let start: i64 = interval_id
        .trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid timeperiod id: {}", interval_id)))?;

    state
        .engine
        .get_twap(IntervalId::from_start(start))
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No data for this timeperiod".into()))
}
