//! Ingress-side token validation.
//!
//! Pure claim checks layered over the codec — the stateful parts (negative
//! caching, revocation lookups, metrics) belong to the service that calls in.

use crate::claims::{TokenClaims, now_secs};
use crate::codec;

/// Identity extracted from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub client_id: String,
    pub jti: String,
    pub expires_at: u64,
    pub permissions: Vec<String>,
}

/// Errors returned by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("wrong audience")]
    WrongAudience,
    #[error("unknown issuer")]
    WrongIssuer,
    #[error("missing permission")]
    MissingPermission,
}

/// Validate a compact token against the configured key and claim expectations.
///
/// Order: signature first (claims are untrusted before it), then expiry,
/// audience, issuer, and — when `required_permission` is set — permission
/// membership.
pub fn validate(
    token: &str,
    key: &[u8],
    expected_audience: &str,
    allowed_issuers: &[String],
    required_permission: Option<&str>,
) -> Result<TokenInfo, TokenError> {
    validate_at(
        token,
        key,
        expected_audience,
        allowed_issuers,
        required_permission,
        now_secs(),
    )
}

/// [`validate`] with an explicit clock, for boundary tests.
pub fn validate_at(
    token: &str,
    key: &[u8],
    expected_audience: &str,
    allowed_issuers: &[String],
    required_permission: Option<&str>,
    now: u64,
) -> Result<TokenInfo, TokenError> {
    if !codec::verify_signature(token, key) {
        // A token that does not even parse is malformed, not merely unsigned.
        return Err(if codec::parse(token).is_none() {
            TokenError::Malformed
        } else {
            TokenError::InvalidSignature
        });
    }
    let claims = codec::parse(token).ok_or(TokenError::Malformed)?;

    if claims.exp <= now {
        return Err(TokenError::Expired);
    }
    if claims.aud != expected_audience {
        return Err(TokenError::WrongAudience);
    }
    if !allowed_issuers.iter().any(|issuer| issuer == &claims.iss) {
        return Err(TokenError::WrongIssuer);
    }
    if let Some(permission) = required_permission {
        if !claims.permissions.iter().any(|p| p == permission) {
            return Err(TokenError::MissingPermission);
        }
    }

    Ok(TokenInfo {
        client_id: claims.sub,
        jti: claims.jti,
        expires_at: claims.exp,
        permissions: claims.permissions,
    })
}

/// True inside the final tenth of the token's life — the caller may mint
/// ahead so the replacement is cached before this one expires.
pub fn renewal_hint(claims: &TokenClaims, now: u64) -> bool {
    let lifetime = claims.exp.saturating_sub(claims.iat);
    now < claims.exp && now >= claims.exp.saturating_sub(lifetime / 10)
}
