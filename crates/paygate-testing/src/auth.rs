//! Legacy credential header builders for integration tests.

use http::{HeaderMap, HeaderName, HeaderValue};

/// Vendor credentials injected into test requests the way legacy clients
/// send them.
pub struct CredentialHeaders {
    pub client_id: String,
    pub client_secret: String,
    pub correlation_id: Option<String>,
}

impl CredentialHeaders {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            correlation_id: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.correlation_id = Some(correlation_id.to_owned());
        self
    }

    /// Return headers as a legacy vendor would send them.
    pub fn headers(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(
            HeaderName::from_static("x-client-id"),
            HeaderValue::from_str(&self.client_id).unwrap(),
        );
        map.insert(
            HeaderName::from_static("x-client-secret"),
            HeaderValue::from_str(&self.client_secret).unwrap(),
        );
        if let Some(ref correlation_id) = self.correlation_id {
            map.insert(
                HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_str(correlation_id).unwrap(),
            );
        }
        map
    }
}
