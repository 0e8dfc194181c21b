use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Wire shape of every error response emitted by the gateway.
///
/// `request_id` echoes the inbound correlation id when one was provided,
/// otherwise it is a fresh UUID generated at response time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_code: String,
    pub message: String,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorBody {
    pub fn new(error_code: &str, message: &str, request_id: &str) -> Self {
        Self {
            error_code: error_code.to_owned(),
            message: message.to_owned(),
            request_id: request_id.to_owned(),
            timestamp: Utc::now(),
        }
    }
}

/// Build a JSON error response in the shared body shape.
pub fn error_response(
    status: StatusCode,
    error_code: &str,
    message: &str,
    request_id: &str,
) -> Response {
    (
        status,
        axum::Json(ErrorBody::new(error_code, message, request_id)),
    )
        .into_response()
}
