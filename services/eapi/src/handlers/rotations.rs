use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paygate_core::middleware::Correlation;

use crate::domain::types::{Rotation, RotationPhase};
use crate::error::{ApiError, GatewayError};
use crate::state::AppState;

// ── POST /api/v1/rotations/initiate ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRotationRequest {
    pub client_id: String,
    pub reason: String,
    pub transition_period_minutes: Option<i64>,
    #[serde(default)]
    pub force_rotation: bool,
}

/// The one response that ever carries the rotated plaintext secret.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRotationResponse {
    #[serde(flatten)]
    pub rotation: Rotation,
    pub new_secret: String,
}

pub async fn initiate_rotation(
    State(state): State<AppState>,
    correlation: Correlation,
    Json(body): Json<InitiateRotationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let out = state
        .rotations
        .initiate(
            &body.client_id,
            &body.reason,
            body.transition_period_minutes,
            body.force_rotation,
        )
        .await
        .map_err(|e| e.with_request_id(&correlation.0))?;

    Ok((
        StatusCode::CREATED,
        Json(InitiateRotationResponse {
            rotation: out.rotation,
            new_secret: out.new_secret,
        }),
    ))
}

// ── GET /api/v1/rotations/{id} ────────────────────────────────────────────────

pub async fn get_rotation(
    State(state): State<AppState>,
    correlation: Correlation,
    Path(rotation_id): Path<Uuid>,
) -> Result<Json<Rotation>, ApiError> {
    state
        .rotations
        .get(rotation_id)
        .await
        .map(Json)
        .ok_or_else(|| GatewayError::RotationNotFound.with_request_id(&correlation.0))
}

// ── GET /api/v1/rotations/client/{client_id} ──────────────────────────────────

pub async fn list_client_rotations(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Json<Vec<Rotation>> {
    Json(state.rotations.list_for_client(&client_id).await)
}

// ── GET /api/v1/rotations/active ──────────────────────────────────────────────

pub async fn list_active_rotations(State(state): State<AppState>) -> Json<Vec<Rotation>> {
    Json(state.rotations.list_active().await)
}

// ── PUT /api/v1/rotations/{id}/advance ────────────────────────────────────────

#[derive(Deserialize)]
pub struct AdvanceQuery {
    #[serde(rename = "targetState")]
    pub target_state: RotationPhase,
}

pub async fn advance_rotation(
    State(state): State<AppState>,
    correlation: Correlation,
    Path(rotation_id): Path<Uuid>,
    Query(query): Query<AdvanceQuery>,
) -> Result<Json<Rotation>, ApiError> {
    state
        .rotations
        .advance(rotation_id, query.target_state)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(&correlation.0))
}

// ── PUT /api/v1/rotations/{id}/complete ───────────────────────────────────────

pub async fn complete_rotation(
    State(state): State<AppState>,
    correlation: Correlation,
    Path(rotation_id): Path<Uuid>,
) -> Result<Json<Rotation>, ApiError> {
    state
        .rotations
        .complete(rotation_id)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(&correlation.0))
}

// ── DELETE /api/v1/rotations/{id} ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CancelQuery {
    pub reason: Option<String>,
}

pub async fn cancel_rotation(
    State(state): State<AppState>,
    correlation: Correlation,
    Path(rotation_id): Path<Uuid>,
    Query(query): Query<CancelQuery>,
) -> Result<Json<Rotation>, ApiError> {
    let reason = query
        .reason
        .unwrap_or_else(|| "cancelled by operator".to_owned());
    state
        .rotations
        .cancel(rotation_id, &reason)
        .await
        .map(Json)
        .map_err(|e| e.with_request_id(&correlation.0))
}
