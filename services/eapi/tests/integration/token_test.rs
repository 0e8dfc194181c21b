use paygate_eapi::domain::ports::TokenCache;
use paygate_eapi::error::GatewayError;
use paygate_testing::token::TestSigner;
use paygate_token::claims::now_secs;

use crate::helpers::{credential, harness};

#[tokio::test]
async fn should_validate_minted_token() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));
    let token = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();

    assert!(h.auth.validate_token(&token.token).await);
    let (valid, invalid) = h.metrics.validation_counts();
    assert_eq!((valid, invalid), (1, 0));
}

#[tokio::test]
async fn should_reject_tampered_signature_and_negative_cache_it() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));
    let token = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();

    let mut tampered = token.token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });

    assert!(!h.auth.validate_token(&tampered).await);
    // The second check is served from the negative cache, still invalid.
    assert!(h.cache.negative_hit(&tampered).await);
    assert!(!h.auth.validate_token(&tampered).await);

    let (valid, invalid) = h.metrics.validation_counts();
    assert_eq!((valid, invalid), (0, 2));

    // The untampered token is unaffected.
    assert!(h.auth.validate_token(&token.token).await);
}

#[tokio::test]
async fn should_reject_wrong_segment_counts() {
    let h = harness();
    let signer = TestSigner::default();
    let token = signer.mint("vendor-a");

    let two_segments = token.rsplit_once('.').unwrap().0.to_owned();
    let four_segments = format!("{token}.extra");

    assert!(!h.auth.validate_token(&two_segments).await);
    assert!(!h.auth.validate_token(&four_segments).await);
}

#[tokio::test]
async fn should_reject_wrong_audience_and_issuer() {
    let h = harness();
    let signer = TestSigner::default();

    let wrong_aud = signer.mint_with("vendor-a", |c| c.aud = "someone-else".to_owned());
    let wrong_iss = signer.mint_with("vendor-a", |c| c.iss = "rogue".to_owned());
    let expired = signer.mint_with("vendor-a", |c| c.exp = now_secs());

    assert!(!h.auth.validate_token(&wrong_aud).await);
    assert!(!h.auth.validate_token(&wrong_iss).await);
    assert!(!h.auth.validate_token(&expired).await, "exp == now is expired");
}

#[tokio::test]
async fn should_reject_revoked_tokens_after_client_invalidation() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));
    let token = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();
    assert!(h.auth.validate_token(&token.token).await);

    let removed = h.auth.revoke("vendor-a").await;
    assert_eq!(removed, 1);
    assert!(!h.auth.validate_token(&token.token).await);
    assert!(h.cache.by_client_id("vendor-a").await.is_none());
}

#[tokio::test]
async fn should_refresh_into_new_jti_and_revoke_old() {
    let h = harness();
    h.vault.seed(credential("vendor-a", "s3cret-16chars!!", 1));
    let original = h.auth.authenticate("vendor-a", "s3cret-16chars!!").await.unwrap();

    let refreshed = h.auth.refresh(&original.token).await.unwrap();
    assert_ne!(refreshed.token, original.token);
    assert_ne!(refreshed.jti(), original.jti());
    assert_eq!(refreshed.claims.sub, "vendor-a");
    assert_eq!(refreshed.claims.permissions, original.claims.permissions);

    // The replacement is valid and cached; the original jti is revoked.
    assert!(h.auth.validate_token(&refreshed.token).await);
    assert!(!h.auth.validate_token(&original.token).await);
    assert_eq!(
        h.cache.by_client_id("vendor-a").await.unwrap().token,
        refreshed.token
    );

    // Refreshing a revoked token is refused.
    let err = h.auth.refresh(&original.token).await.unwrap_err();
    assert!(matches!(err, GatewayError::TokenInvalid));
}

#[tokio::test]
async fn should_refuse_refresh_of_foreign_signature() {
    let h = harness();
    let signer = TestSigner {
        key: b"a-different-signing-key".to_vec(),
    };
    let foreign = signer.mint("vendor-a");

    let err = h.auth.refresh(&foreign).await.unwrap_err();
    assert!(matches!(err, GatewayError::TokenInvalid));
}
