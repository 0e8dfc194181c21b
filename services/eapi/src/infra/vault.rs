use std::sync::Arc;
use std::time::Duration;

use rand::RngExt;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::domain::ports::{VaultClient, VaultError};
use crate::domain::types::CredentialRecord;

/// Retry/backoff settings for vault calls. Only `Unavailable` outcomes are
/// retried; `NotFound` and `Denied` surface immediately.
#[derive(Debug, Clone)]
pub struct VaultRetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
}

impl VaultRetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let jitter = rand::rng().random_range(0..=self.base_delay.as_millis() as u64 / 2);
        Duration::from_millis(backoff as u64 + jitter)
    }
}

/// HTTP client for the credential vault.
///
/// Holds one short-lived vault session; at most one session authentication is
/// inflight per process — concurrent callers wait on the winner and reuse its
/// session.
#[derive(Clone)]
pub struct HttpVaultClient {
    inner: Arc<VaultClientInner>,
}

struct VaultClientInner {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<String>>,
    session_lock: Mutex<()>,
    retry: VaultRetryPolicy,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Deserialize)]
struct ActiveVersionsResponse {
    versions: Vec<CredentialRecord>,
}

impl HttpVaultClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
        retry: VaultRetryPolicy,
    ) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(VaultClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_owned(),
                api_key: api_key.to_owned(),
                session: RwLock::new(None),
                session_lock: Mutex::new(()),
                retry,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base_url)
    }

    /// Get the current session token, authenticating if none exists.
    ///
    /// `session_lock` serializes authentication: losers of the race re-check
    /// under the lock and reuse the winner's session.
    async fn session(&self) -> Result<String, VaultError> {
        if let Some(token) = self.inner.session.read().await.clone() {
            return Ok(token);
        }

        let _guard = self.inner.session_lock.lock().await;
        if let Some(token) = self.inner.session.read().await.clone() {
            return Ok(token);
        }

        debug!("authenticating to vault");
        let response = self
            .inner
            .http
            .post(self.url("/auth/session"))
            .json(&json!({ "apiKey": self.inner.api_key }))
            .send()
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let session: SessionResponse = response
                    .json()
                    .await
                    .map_err(|e| VaultError::Unavailable(e.to_string()))?;
                *self.inner.session.write().await = Some(session.token.clone());
                Ok(session.token)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(VaultError::Denied),
            status => Err(VaultError::Unavailable(format!(
                "vault session auth returned {status}"
            ))),
        }
    }

    async fn drop_session(&self) {
        *self.inner.session.write().await = None;
    }

    /// One attempt of a vault request, with session handling.
    async fn send_once(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, VaultError> {
        let session = self.session().await?;
        let mut request = self
            .inner
            .http
            .request(method, self.url(path))
            .header("x-vault-session", session);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| VaultError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(VaultError::NotFound),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Session may simply have expired; drop it so the next
                // attempt re-authenticates.
                self.drop_session().await;
                Err(VaultError::Denied)
            }
            status if status.is_server_error() => {
                Err(VaultError::Unavailable(format!("vault returned {status}")))
            }
            _ => Ok(response),
        }
    }

    /// A vault request with the retry policy applied.
    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, VaultError> {
        let mut attempt = 0;
        let mut reauthed = false;
        loop {
            match self.send_once(method.clone(), path, body.as_ref()).await {
                Ok(response) => return Ok(response),
                Err(VaultError::Unavailable(detail)) if attempt + 1 < self.inner.retry.attempts => {
                    let delay = self.inner.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %detail,
                        "vault unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                // A denied call after a previously valid session usually means
                // the session expired; `send_once` already dropped it, so one
                // immediate re-authenticated attempt is warranted.
                Err(VaultError::Denied) if !reauthed => {
                    reauthed = true;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, VaultError> {
        response
            .json()
            .await
            .map_err(|e| VaultError::Unavailable(format!("vault response decode: {e}")))
    }
}

impl VaultClient for HttpVaultClient {
    async fn retrieve(&self, client_id: &str) -> Result<CredentialRecord, VaultError> {
        let response = self
            .send(reqwest::Method::GET, &format!("/secrets/{client_id}"), None)
            .await?;
        Self::decode(response).await
    }

    async fn retrieve_version(
        &self,
        client_id: &str,
        version: u32,
    ) -> Result<CredentialRecord, VaultError> {
        let response = self
            .send(
                reqwest::Method::GET,
                &format!("/secrets/{client_id}/versions/{version}"),
                None,
            )
            .await?;
        Self::decode(response).await
    }

    async fn store(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
    ) -> Result<(), VaultError> {
        self.send(
            reqwest::Method::PUT,
            &format!("/secrets/{client_id}"),
            Some(serde_json::to_value(credential).map_err(|e| {
                VaultError::Unavailable(format!("credential encode: {e}"))
            })?),
        )
        .await
        .map(|_| ())
    }

    async fn store_new_version(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
        version: u32,
    ) -> Result<(), VaultError> {
        self.send(
            reqwest::Method::PUT,
            &format!("/secrets/{client_id}/versions/{version}"),
            Some(serde_json::to_value(credential).map_err(|e| {
                VaultError::Unavailable(format!("credential encode: {e}"))
            })?),
        )
        .await
        .map(|_| ())
    }

    async fn configure_transition(
        &self,
        client_id: &str,
        old_version: u32,
        new_version: u32,
        window_secs: u64,
    ) -> Result<(), VaultError> {
        self.send(
            reqwest::Method::POST,
            &format!("/secrets/{client_id}/transition"),
            Some(json!({
                "oldVersion": old_version,
                "newVersion": new_version,
                "windowSeconds": window_secs,
            })),
        )
        .await
        .map(|_| ())
    }

    async fn disable_version(&self, client_id: &str, version: u32) -> Result<(), VaultError> {
        self.send(
            reqwest::Method::POST,
            &format!("/secrets/{client_id}/versions/{version}/disable"),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn remove_version(&self, client_id: &str, version: u32) -> Result<(), VaultError> {
        self.send(
            reqwest::Method::DELETE,
            &format!("/secrets/{client_id}/versions/{version}"),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn get_active_versions(
        &self,
        client_id: &str,
    ) -> Result<Vec<CredentialRecord>, VaultError> {
        let response = self
            .send(
                reqwest::Method::GET,
                &format!("/secrets/{client_id}/versions?active=true"),
                None,
            )
            .await?;
        let body: ActiveVersionsResponse = Self::decode(response).await?;
        Ok(body.versions)
    }

    async fn is_available(&self) -> bool {
        let Ok(response) = self
            .inner
            .http
            .get(self.url("/health"))
            .send()
            .await
        else {
            return false;
        };
        response.status().is_success()
    }
}
