use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::domain::ports::{TokenCache as _, VaultClient as _};
use crate::state::AppState;

/// Handler for `GET /api/v1/health/detailed` — vault reachability plus
/// cache and rotation gauges.
pub async fn detailed_health(State(state): State<AppState>) -> Json<Value> {
    let vault_available = state.vault.is_available().await;
    Json(json!({
        "status": if vault_available { "UP" } else { "DEGRADED" },
        "vault": { "available": vault_available },
        "cache": { "tokens": state.cache.token_count().await },
        "rotations": { "active": state.rotations.active_count() },
    }))
}

/// Handler for `GET /api/v1/health/readiness` — ready only when the vault
/// answers; degraded credential fallback is not enough to take traffic.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.vault.is_available().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
