use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use bytes::Bytes;
use http::Method;

use paygate_core::middleware::Correlation;

use crate::error::{ApiError, GatewayError};
use crate::state::AppState;

const X_CLIENT_ID: &str = "x-client-id";
const X_CLIENT_SECRET: &str = "x-client-secret";
const X_IDEMPOTENCY_KEY: &str = "x-idempotency-key";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the bearer token to forward with.
///
/// Migrated clients present `Authorization: Bearer` directly; legacy clients
/// present `X-Client-ID`/`X-Client-Secret`, exchanged for a cached or freshly
/// minted token. Both paths yield a token signed by this gateway — the bearer
/// path only passes validation against our own signing key — so downstream
/// 401 handling treats them identically.
async fn resolve_token(
    state: &AppState,
    bearer: Option<&str>,
    headers: &HeaderMap,
) -> Result<String, GatewayError> {
    if let Some(bearer) = bearer {
        if !state.auth.validate_token(bearer).await {
            return Err(GatewayError::TokenInvalid);
        }
        return Ok(bearer.to_owned());
    }

    match (
        header(headers, X_CLIENT_ID),
        header(headers, X_CLIENT_SECRET),
    ) {
        (Some(client_id), Some(client_secret)) => {
            let token = state.auth.authenticate(client_id, client_secret).await?;
            Ok(token.token)
        }
        _ => Err(GatewayError::MissingCredentials),
    }
}

/// Forward, retrying exactly once with a refreshed token on downstream 401;
/// every other status passes through. The refreshed token is not propagated
/// back to the caller; the next request picks it up from the cache.
async fn forward_with_refresh(
    state: &AppState,
    method: Method,
    path: &str,
    body: Option<Bytes>,
    token: String,
    correlation_id: &str,
) -> Result<Response, GatewayError> {
    let response = state
        .forwarder
        .forward(method.clone(), path, body.clone(), &token, correlation_id)
        .await?;

    let response = if response.status == http::StatusCode::UNAUTHORIZED {
        let fresh = state.auth.refresh(&token).await?;
        state
            .forwarder
            .forward(method, path, body, &fresh.token, correlation_id)
            .await?
    } else {
        response
    };

    Ok((response.status, response.headers, response.body).into_response())
}

// ── POST /api/v1/payments ─────────────────────────────────────────────────────

pub async fn create_payment(
    State(state): State<AppState>,
    correlation: Correlation,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let bearer = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let result = async {
        if header(&headers, X_IDEMPOTENCY_KEY).is_none() {
            return Err(GatewayError::MissingHeader(X_IDEMPOTENCY_KEY));
        }
        let token = resolve_token(&state, bearer, &headers).await?;
        forward_with_refresh(
            &state,
            Method::POST,
            "/api/v1/payments",
            Some(body),
            token,
            &correlation.0,
        )
        .await
    }
    .await;
    result.map_err(|e| e.with_request_id(&correlation.0))
}

// ── GET /api/v1/payments/{id} ─────────────────────────────────────────────────

pub async fn get_payment(
    State(state): State<AppState>,
    correlation: Correlation,
    Path(payment_id): Path<String>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let bearer = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
    let result = async {
        let token = resolve_token(&state, bearer, &headers).await?;
        forward_with_refresh(
            &state,
            Method::GET,
            &format!("/api/v1/payments/{payment_id}"),
            None,
            token,
            &correlation.0,
        )
        .await
    }
    .await;
    result.map_err(|e| e.with_request_id(&correlation.0))
}
