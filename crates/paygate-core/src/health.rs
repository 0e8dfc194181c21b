use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

/// Handler for `GET /api/v1/health` — basic status.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

/// Handler for `GET /api/v1/health/liveness` — liveness check.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
