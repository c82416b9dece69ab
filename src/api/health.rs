use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub last_processed_block: u64,
    pub uptime_seconds: u64,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let last_processed_block = state
        .dao
        .get_latest_processed_block()
        .await
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)?;

    let status = if last_processed_block >= state.config.begin_block {
        "ok"
    } else {
        "syncing"
    };

    Ok(Json(HealthResponse {
        status,
        last_processed_block,
        uptime_seconds: state.uptime_seconds(),
    }))
}
