use std::sync::Arc;
use std::time::Duration;

use crate::config::EapiConfig;
use crate::infra::cache::{InMemoryCredentialCache, InMemoryTokenCache};
use crate::infra::forwarder::HttpForwarder;
use crate::infra::metrics::TracingMetricsSink;
use crate::infra::notify::WebhookNotifier;
use crate::infra::vault::{HttpVaultClient, VaultRetryPolicy};
use crate::usecase::authenticate::{AuthenticationService, TokenSettings};
use crate::usecase::credential::CredentialValidator;
use crate::usecase::rotation::{RotationManager, RotationSettings};

/// Downstream forwarding timeout.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);

/// Base delay for vault retry backoff.
const VAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

pub type AuthService = AuthenticationService<
    HttpVaultClient,
    InMemoryCredentialCache,
    InMemoryTokenCache,
    TracingMetricsSink,
>;

pub type Rotations = RotationManager<
    HttpVaultClient,
    InMemoryCredentialCache,
    InMemoryTokenCache,
    WebhookNotifier,
    TracingMetricsSink,
>;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub rotations: Arc<Rotations>,
    pub forwarder: HttpForwarder,
    pub vault: HttpVaultClient,
    pub cache: InMemoryTokenCache,
}

impl AppState {
    pub fn build(config: &EapiConfig) -> Result<Self, anyhow::Error> {
        let vault = HttpVaultClient::new(
            &config.vault_url,
            &config.vault_api_key,
            Duration::from_millis(config.vault_connection_timeout_ms),
            Duration::from_millis(config.vault_read_timeout_ms),
            VaultRetryPolicy {
                attempts: config.vault_retry_count.max(1),
                base_delay: VAULT_RETRY_BASE_DELAY,
                multiplier: config.vault_retry_backoff_multiplier,
            },
        )?;

        let cache = InMemoryTokenCache::new(config.effective_negative_ttl_secs());
        let credential_fallback = InMemoryCredentialCache::new(config.cache_default_ttl_secs);
        let metrics = TracingMetricsSink;

        let auth = Arc::new(AuthenticationService::new(
            CredentialValidator {
                vault: vault.clone(),
                fallback: credential_fallback.clone(),
            },
            cache.clone(),
            metrics.clone(),
            TokenSettings {
                signing_key: config.signing_key.as_bytes().to_vec(),
                lifetime_secs: config.token_lifetime_secs,
                renewal_threshold_secs: config.token_renewal_threshold_secs,
                issuer: config.token_issuer.clone(),
                audience: config.token_audience.clone(),
                allowed_issuers: config.token_allowed_issuers.clone(),
            },
        ));

        let rotations = Arc::new(RotationManager::new(
            vault.clone(),
            credential_fallback,
            cache.clone(),
            WebhookNotifier::new(config.rotation_webhook_url.clone()),
            metrics,
            RotationSettings {
                default_transition_minutes: config.rotation_default_transition_minutes,
                max_retry_attempts: config.rotation_max_retry_attempts,
            },
        ));

        let forwarder = HttpForwarder::new(&config.downstream_url, FORWARD_TIMEOUT)?;

        Ok(Self {
            auth,
            rotations,
            forwarder,
            vault,
            cache,
        })
    }
}
