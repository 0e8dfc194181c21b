use std::convert::Infallible;

use axum::extract::FromRequestParts;
use http::request::Parts;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

/// Header carrying the request-scoped correlation id across services.
pub const X_CORRELATION_ID: &str = "x-correlation-id";

#[derive(Clone, Default)]
pub struct MakeUuidCorrelationId;

impl MakeRequestId for MakeUuidCorrelationId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(id.parse().unwrap()))
    }
}

/// Build the correlation-id layer. `SetRequestIdLayer` only generates an id
/// when the header is absent, which gives the echo-inbound-or-mint semantics.
/// Apply with `.layer(correlation_id_layer())` in the router.
pub fn correlation_id_layer() -> SetRequestIdLayer<MakeUuidCorrelationId> {
    SetRequestIdLayer::new(
        axum::http::HeaderName::from_static(X_CORRELATION_ID),
        MakeUuidCorrelationId,
    )
}

/// Copy the correlation id from the request onto the response.
pub fn propagate_correlation_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(axum::http::HeaderName::from_static(X_CORRELATION_ID))
}

/// Correlation id extractor for handlers that stamp error bodies.
///
/// Reads the header populated by [`correlation_id_layer`]; when the layer is
/// not installed (tests, direct handler calls) a fresh UUID is minted so the
/// id is always present.
#[derive(Debug, Clone)]
pub struct Correlation(pub String);

impl<S> FromRequestParts<S> for Correlation
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    // axum-core 0.5 defines this as `fn -> impl Future + Send` (not `async fn`).
    // Extract synchronously, return a 'static async move block.
    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let id = parts
            .headers
            .get(X_CORRELATION_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        async move { Ok(Self(id.unwrap_or_else(|| Uuid::new_v4().to_string()))) }
    }
}
