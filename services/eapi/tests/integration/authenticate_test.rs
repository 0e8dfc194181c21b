use std::sync::atomic::Ordering;

use paygate_eapi::domain::ports::TokenCache;
use paygate_eapi::error::GatewayError;
use paygate_token::claims::{Token, TokenClaims, now_secs};

use crate::helpers::{credential, harness};

#[tokio::test]
async fn should_authenticate_valid_credentials_and_cache_token() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    let token = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();

    assert_eq!(token.claims.sub, "vendor-a");
    assert_eq!(token.claims.iss, "payment-eapi");
    assert_eq!(token.claims.aud, "payment-sapi");
    assert!(token.claims.exp > token.claims.iat);
    assert!(
        token
            .claims
            .permissions
            .contains(&"payments:write".to_owned())
    );

    // The cache now serves the same token.
    let cached = h.cache.by_client_id("vendor-a").await.unwrap();
    assert_eq!(cached.token, token.token);
    let by_jti = h.cache.by_token_id(token.jti()).await.unwrap();
    assert_eq!(by_jti.token, token.token);

    let attempts = h.metrics.attempts_for("vendor-a");
    assert_eq!(attempts, vec![("vendor-a".to_owned(), true, false)]);
}

#[tokio::test]
async fn should_reuse_cached_token_without_hitting_vault() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    let first = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();
    let second = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(h.vault.active_version_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn should_remint_when_cached_token_is_near_expiry() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    // Plant a token with only 10% of its life left — below the reuse floor.
    let now = now_secs();
    let stale = Token {
        token: "stale-token".to_owned(),
        claims: TokenClaims {
            sub: "vendor-a".to_owned(),
            iss: "payment-eapi".to_owned(),
            aud: "payment-sapi".to_owned(),
            exp: now + 100,
            iat: now - 900,
            jti: "stale-jti".to_owned(),
            permissions: vec![],
        },
    };
    h.cache.store_token(&stale).await;

    let fresh = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();
    assert_ne!(fresh.token, "stale-token");
    assert_eq!(h.vault.active_version_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn should_reject_wrong_secret_without_caching() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    let err = h.auth.authenticate("vendor-a", "wrong").await.unwrap_err();
    assert!(matches!(err, GatewayError::InvalidCredentials));
    assert!(h.cache.by_client_id("vendor-a").await.is_none());

    let attempts = h.metrics.attempts_for("vendor-a");
    assert_eq!(attempts, vec![("vendor-a".to_owned(), false, false)]);
}

#[tokio::test]
async fn should_reject_empty_credentials_as_missing() {
    let h = harness();

    let err = h.auth.authenticate("", "secret").await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingCredentials));

    let err = h.auth.authenticate("vendor-a", "").await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingCredentials));

    // Control characters only — sanitization collapses to empty.
    let err = h.auth.authenticate("\r\n", "\r\n").await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingCredentials));
}

#[tokio::test]
async fn should_fall_back_to_cached_credentials_when_vault_down() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    // Warm the fallback with a healthy authentication, then lose the vault
    // and the cached token.
    h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();
    h.vault.set_available(false);
    h.cache.invalidate_by_client_id("vendor-a").await;

    let token = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();
    assert_eq!(token.claims.sub, "vendor-a");

    let attempts = h.metrics.attempts_for("vendor-a");
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1], ("vendor-a".to_owned(), true, true), "fallback hit must be degraded");
}

#[tokio::test]
async fn should_surface_503_when_vault_down_and_fallback_cold() {
    let h = harness();
    h.vault.set_available(false);

    let err = h.auth.authenticate("vendor-a", "whatever").await.unwrap_err();
    assert!(matches!(err, GatewayError::VaultUnavailable));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn should_single_flight_concurrent_mints() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));

    let mut joins = Vec::new();
    for _ in 0..100 {
        let auth = h.auth.clone();
        joins.push(tokio::spawn(async move {
            auth.authenticate("vendor-a", "s3cret-16chars!!").await
        }));
    }

    let mut tokens = Vec::new();
    for join in joins {
        tokens.push(join.await.unwrap().unwrap().token);
    }

    // Exactly one caller reached the credential validator; everyone received
    // the token it minted.
    assert_eq!(h.vault.active_version_calls.load(Ordering::SeqCst), 1);
    tokens.dedup();
    assert_eq!(tokens.len(), 1, "all 100 callers must share one token");
}
