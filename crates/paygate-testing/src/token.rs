//! Test token signer: mints tokens with arbitrary claims for validator and
//! gateway tests.

use paygate_token::claims::{TokenClaims, now_secs};
use paygate_token::codec;
use uuid::Uuid;

/// Signing key used across the integration suites.
pub const TEST_SIGNING_KEY: &[u8] = b"test-signing-key-for-integration";

/// Mints test tokens with sane defaults and targeted claim overrides.
pub struct TestSigner {
    pub key: Vec<u8>,
}

impl Default for TestSigner {
    fn default() -> Self {
        Self {
            key: TEST_SIGNING_KEY.to_vec(),
        }
    }
}

impl TestSigner {
    /// Default claims: one-hour token for `client_id` from `payment-eapi`
    /// to `payment-sapi` with write permission.
    pub fn claims(client_id: &str) -> TokenClaims {
        let now = now_secs();
        TokenClaims {
            sub: client_id.to_owned(),
            iss: "payment-eapi".to_owned(),
            aud: "payment-sapi".to_owned(),
            exp: now + 3600,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            permissions: vec!["payments:write".to_owned()],
        }
    }

    pub fn mint(&self, client_id: &str) -> String {
        self.mint_claims(Self::claims(client_id))
    }

    pub fn mint_claims(&self, claims: TokenClaims) -> String {
        codec::generate(&claims, &self.key).expect("test token generation")
    }

    /// Mint with a claim mutation applied to the defaults.
    pub fn mint_with(&self, client_id: &str, mutate: impl FnOnce(&mut TokenClaims)) -> String {
        let mut claims = Self::claims(client_id);
        mutate(&mut claims);
        self.mint_claims(claims)
    }
}
