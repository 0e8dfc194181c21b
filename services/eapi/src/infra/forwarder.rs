use std::time::Duration;

use bytes::Bytes;
use http::header::{
    AUTHORIZATION, CONNECTION, CONTENT_LENGTH, HOST, TE, TRANSFER_ENCODING, UPGRADE,
};
use http::{HeaderMap, Method, StatusCode};

use paygate_core::middleware::X_CORRELATION_ID;

use crate::error::GatewayError;

/// Response propagated back from the downstream service. The body is opaque
/// bytes; headers are filtered of hop-by-hop and auth noise.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Forwards ingress requests to the downstream payment service.
#[derive(Clone)]
pub struct HttpForwarder {
    http: reqwest::Client,
    base_url: String,
}

impl HttpForwarder {
    pub fn new(base_url: &str, read_timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder().timeout(read_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Rewrite the public path onto the internal prefix:
    /// `/api/v1/payments` → `/internal/v1/payments`.
    fn rewrite_path(path: &str) -> String {
        path.replacen("/api/", "/internal/", 1)
    }

    fn filter_headers(headers: &HeaderMap) -> HeaderMap {
        let mut filtered = HeaderMap::new();
        for (name, value) in headers {
            let drop = name == CONNECTION
                || name == TRANSFER_ENCODING
                || name == CONTENT_LENGTH
                || name == UPGRADE
                || name == TE
                || name == HOST
                || name == AUTHORIZATION;
            if !drop {
                filtered.append(name.clone(), value.clone());
            }
        }
        filtered
    }

    /// Forward one request with the bearer token attached and the correlation
    /// id propagated. The caller owns the retry-on-401 policy.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        token: &str,
        correlation_id: &str,
    ) -> Result<ForwardedResponse, GatewayError> {
        let url = format!("{}{}", self.base_url, Self::rewrite_path(path));
        let mut request = self
            .http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(X_CORRELATION_ID, correlation_id);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|_| GatewayError::DownstreamUnavailable)?;

        let status = response.status();
        let headers = Self::filter_headers(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|_| GatewayError::DownstreamUnavailable)?;

        Ok(ForwardedResponse {
            status,
            headers,
            body,
        })
    }
}
