use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use paygate_core::error::error_response;

use crate::domain::ports::VaultError;

/// Gateway domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("missing client credentials")]
    MissingCredentials,
    #[error("invalid client credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    TokenInvalid,
    #[error("required header missing: {0}")]
    MissingHeader(&'static str),
    #[error("credential vault unavailable")]
    VaultUnavailable,
    #[error("rotation not found")]
    RotationNotFound,
    #[error("another rotation is already active for this client")]
    RotationConflict,
    #[error("illegal rotation state transition")]
    IllegalTransition,
    #[error("downstream service unavailable")]
    DownstreamUnavailable,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials | Self::TokenInvalid => {
                "AUTH_ERROR"
            }
            Self::MissingHeader(_) => "MISSING_HEADER",
            Self::VaultUnavailable => "CONJUR_ERROR",
            Self::RotationNotFound => "NOT_FOUND",
            Self::RotationConflict => "ROTATION_CONFLICT",
            Self::IllegalTransition => "INVALID_TRANSITION",
            Self::DownstreamUnavailable => "DOWNSTREAM_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidCredentials | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::MissingHeader(_) | Self::IllegalTransition => StatusCode::BAD_REQUEST,
            Self::VaultUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RotationNotFound => StatusCode::NOT_FOUND,
            Self::RotationConflict => StatusCode::CONFLICT,
            Self::DownstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the request-scoped correlation id for the error body.
    pub fn with_request_id(self, request_id: &str) -> ApiError {
        ApiError {
            request_id: request_id.to_owned(),
            error: self,
        }
    }
}

impl From<VaultError> for GatewayError {
    fn from(err: VaultError) -> Self {
        match err {
            // An unknown client is indistinguishable from a bad secret at the
            // ingress boundary; existence must not leak.
            VaultError::NotFound => Self::InvalidCredentials,
            VaultError::Unavailable(_) => Self::VaultUnavailable,
            VaultError::Denied => Self::Internal(anyhow::anyhow!("vault denied the request")),
        }
    }
}

/// A [`GatewayError`] stamped with the correlation id of the failing request.
#[derive(Debug)]
pub struct ApiError {
    request_id: String,
    error: GatewayError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Log 500s only — tower-http TraceLayer already records method/uri/status
        // for all requests. 4xx are expected client errors; logging them here
        // would be noise. Internal errors need the anyhow chain logged so the
        // root cause is traceable.
        if let GatewayError::Internal(ref e) = self.error {
            tracing::error!(error = %e, request_id = %self.request_id, "internal error");
        }
        error_response(
            self.error.status(),
            self.error.error_code(),
            &self.error.to_string(),
            &self.request_id,
        )
    }
}

impl IntoResponse for GatewayError {
    /// Fallback for paths with no correlation id at hand; mints a fresh one.
    fn into_response(self) -> Response {
        self.with_request_id(&Uuid::new_v4().to_string())
            .into_response()
    }
}
