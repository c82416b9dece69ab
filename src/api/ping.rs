use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct PingResponse {
    pub message: &'static str,
}

/// Thin liveness check mirroring the original service's `/api/ping`.
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse { message: "pong" })
}
