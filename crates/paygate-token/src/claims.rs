//! Token claim set and the minted-token value type.

use serde::Deserialize;
#[cfg(any(feature = "USE_ONLY_IN_EAPI", test))]
use serde::Serialize;

/// Claims payload shared by token minting (gateway) and validation (downstream).
///
/// # Fields
///
/// | Field | JWT claim | Meaning |
/// |-------|-----------|---------|
/// | `sub` | `sub` | client id the token was minted for |
/// | `iss` | `iss` | issuing service (`payment-eapi`) |
/// | `aud` | `aud` | intended consumer (`payment-sapi`) |
/// | `exp` | `exp` | expiration, seconds since epoch |
/// | `iat` | `iat` | issued-at, seconds since epoch |
/// | `jti` | `jti` | unique token id (UUID), revocation key |
/// | `permissions` | custom | ordered permission strings |
///
/// Unknown fields are ignored on decode. [`Serialize`] requires the
/// **`USE_ONLY_IN_EAPI`** cargo feature — only the gateway mints tokens.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[cfg_attr(any(feature = "USE_ONLY_IN_EAPI", test), derive(Serialize))]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    pub jti: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// A minted token: the compact signed string plus its parsed claims.
#[derive(Debug, Clone)]
pub struct Token {
    pub token: String,
    pub claims: TokenClaims,
}

impl Token {
    pub fn client_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn jti(&self) -> &str {
        &self.claims.jti
    }

    /// Expiration, seconds since epoch. `exp == now` counts as expired.
    pub fn expires_at(&self) -> u64 {
        self.claims.exp
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.claims.exp <= now
    }

    /// Remaining life at `now` as a fraction of total lifetime (0.0 once expired).
    pub fn life_remaining(&self, now: u64) -> f64 {
        let lifetime = self.claims.exp.saturating_sub(self.claims.iat);
        if lifetime == 0 {
            return 0.0;
        }
        self.claims.exp.saturating_sub(now) as f64 / lifetime as f64
    }
}

/// Seconds since the UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before UNIX epoch")
        .as_secs()
}
