use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use paygate_token::claims::{Token, TokenClaims, now_secs};
use paygate_token::codec;
use paygate_token::validator as token_validator;

use crate::domain::ports::{CredentialCache, MetricsSink, TokenCache, VaultClient};
use crate::error::GatewayError;
use crate::usecase::credential::CredentialValidator;

/// Token settings fixed at startup. The signing key is process-wide and
/// immutable; rotating it means restarting the process.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub signing_key: Vec<u8>,
    pub lifetime_secs: u64,
    /// Remaining life below which validation logs a renewal hint.
    pub renewal_threshold_secs: u64,
    pub issuer: String,
    pub audience: String,
    pub allowed_issuers: Vec<String>,
}

/// Cached tokens below this fraction of remaining life are re-minted rather
/// than reused, so callers never receive a nearly-dead token.
const REUSE_MIN_LIFE: f64 = 0.2;

/// Strip CR/LF, other control characters, and HTML-ish angle brackets from a
/// header value, then trim surrounding whitespace.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_control() && *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .to_owned()
}

/// Orchestrates credential validation, token minting, and the token cache.
///
/// Long-lived: owns the per-client single-flight locks, so one instance is
/// shared across all requests.
pub struct AuthenticationService<V, F, C, M> {
    validator: CredentialValidator<V, F>,
    cache: C,
    metrics: M,
    settings: TokenSettings,
    flights: DashMap<String, Arc<Mutex<()>>>,
}

impl<V, F, C, M> AuthenticationService<V, F, C, M>
where
    V: VaultClient,
    F: CredentialCache,
    C: TokenCache,
    M: MetricsSink,
{
    pub fn new(
        validator: CredentialValidator<V, F>,
        cache: C,
        metrics: M,
        settings: TokenSettings,
    ) -> Self {
        Self {
            validator,
            cache,
            metrics,
            settings,
            flights: DashMap::new(),
        }
    }

    fn reusable(token: &Token) -> bool {
        token.life_remaining(now_secs()) > REUSE_MIN_LIFE
    }

    /// Authenticate legacy header credentials, returning a cached or freshly
    /// minted token.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Token, GatewayError> {
        let started = Instant::now();

        // 1. Sanitize before anything else touches the values.
        let client_id = sanitize(client_id);
        let client_secret = sanitize(client_secret);
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(GatewayError::MissingCredentials);
        }

        // 2. Hot path: reuse the cached token while it has real life left.
        if let Some(token) = self.cache.by_client_id(&client_id).await {
            if Self::reusable(&token) {
                self.metrics
                    .auth_attempt(&client_id, true, false, started.elapsed().as_millis());
                return Ok(token);
            }
        }

        // 3. Single flight: at most one concurrent mint per client id.
        let flight = self
            .flights
            .entry(client_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // 4. Re-check under the lock — the winning caller may have minted.
        if let Some(token) = self.cache.by_client_id(&client_id).await {
            if Self::reusable(&token) {
                self.metrics
                    .auth_attempt(&client_id, true, false, started.elapsed().as_millis());
                return Ok(token);
            }
        }

        // 5. Validate against the vault (or its degraded fallback).
        let validated = match self.validator.verify(&client_id, &client_secret).await {
            Ok(validated) => validated,
            Err(err) => {
                self.metrics
                    .auth_attempt(&client_id, false, false, started.elapsed().as_millis());
                return Err(err);
            }
        };

        // 6. Mint, cache under both keys, report.
        let token = self.mint(&client_id, validated.permissions.clone())?;
        self.cache.store_token(&token).await;
        self.metrics.auth_attempt(
            &client_id,
            true,
            validated.degraded,
            started.elapsed().as_millis(),
        );
        Ok(token)
    }

    fn mint(&self, client_id: &str, permissions: Vec<String>) -> Result<Token, GatewayError> {
        let now = now_secs();
        let claims = TokenClaims {
            sub: client_id.to_owned(),
            iss: self.settings.issuer.clone(),
            aud: self.settings.audience.clone(),
            exp: now + self.settings.lifetime_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            permissions,
        };
        let token =
            codec::generate(&claims, &self.settings.signing_key).map_err(anyhow::Error::from)?;
        Ok(Token { token, claims })
    }

    /// Validate a presented token string: signature, expiry, audience,
    /// issuer, and revocation. Failures are negative-cached briefly.
    pub async fn validate_token(&self, token: &str) -> bool {
        if self.cache.negative_hit(token).await {
            self.metrics.token_validation(false);
            return false;
        }

        let outcome = token_validator::validate(
            token,
            &self.settings.signing_key,
            &self.settings.audience,
            &self.settings.allowed_issuers,
            None,
        );
        let valid = match outcome {
            Ok(info) => !self.cache.is_revoked(&info.jti).await,
            Err(_) => false,
        };

        if valid {
            if let Some(claims) = codec::parse(token) {
                let now = now_secs();
                if token_validator::renewal_hint(&claims, now)
                    || claims.exp.saturating_sub(now) < self.settings.renewal_threshold_secs
                {
                    tracing::debug!(client_id = %claims.sub, "token within renewal window");
                }
            }
        } else {
            self.cache.store_negative(token).await;
        }
        self.metrics.token_validation(valid);
        valid
    }

    /// Mint a replacement for a token whose signature still verifies.
    ///
    /// Expiry is tolerated — the downstream-401 retry races token expiry —
    /// but a revoked jti is refused. The old jti is revoked once the
    /// replacement is cached.
    pub async fn refresh(&self, old_token: &str) -> Result<Token, GatewayError> {
        if !codec::verify_signature(old_token, &self.settings.signing_key) {
            return Err(GatewayError::TokenInvalid);
        }
        let claims = codec::parse(old_token).ok_or(GatewayError::TokenInvalid)?;
        if self.cache.is_revoked(&claims.jti).await {
            return Err(GatewayError::TokenInvalid);
        }

        let token = self.mint(&claims.sub, claims.permissions)?;
        self.cache.store_token(&token).await;
        // After the replacement is in place, so the by-client entry survives.
        self.cache.invalidate_by_token_id(&claims.jti).await;
        Ok(token)
    }

    /// Drop every cached token for a client. Returns the number removed.
    pub async fn revoke(&self, client_id: &str) -> usize {
        self.cache.invalidate_by_client_id(client_id).await
    }
}
