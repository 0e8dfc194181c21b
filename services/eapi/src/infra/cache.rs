use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use paygate_token::claims::{Token, now_secs};

use crate::domain::ports::{CredentialCache, TokenCache};
use crate::domain::types::{CREDENTIAL_FALLBACK_MAX_TTL_SECS, CredentialRecord};

/// In-process token cache.
///
/// Tokens are ephemeral and re-mintable, so nothing here survives restart.
/// Readers treat expired-but-unevicted entries as absent; the rotation
/// scheduler sweeps them out periodically.
#[derive(Clone)]
pub struct InMemoryTokenCache {
    inner: Arc<TokenCacheInner>,
}

struct TokenCacheInner {
    by_client: DashMap<String, Token>,
    by_jti: DashMap<String, Token>,
    /// Per-client jti index, walked by `invalidate_by_client_id`.
    client_jtis: DashMap<String, HashSet<String>>,
    /// Explicitly revoked jtis, kept until their original expiry.
    revoked: DashMap<String, u64>,
    /// Failed-validation cache keyed by the exact token string.
    negative: DashMap<String, u64>,
    negative_ttl_secs: u64,
}

impl InMemoryTokenCache {
    pub fn new(negative_ttl_secs: u64) -> Self {
        Self {
            inner: Arc::new(TokenCacheInner {
                by_client: DashMap::new(),
                by_jti: DashMap::new(),
                client_jtis: DashMap::new(),
                revoked: DashMap::new(),
                negative: DashMap::new(),
                negative_ttl_secs,
            }),
        }
    }

    fn live(token: &Token, now: u64) -> bool {
        !token.is_expired(now)
    }

    fn revoke_jti(&self, jti: &str, exp: u64, now: u64) {
        if exp > now {
            self.inner.revoked.insert(jti.to_owned(), exp);
        }
    }
}

impl TokenCache for InMemoryTokenCache {
    async fn by_client_id(&self, client_id: &str) -> Option<Token> {
        let now = now_secs();
        // Clone out and release the shard guard before any removal.
        let cached = self.inner.by_client.get(client_id).map(|e| e.clone());
        match cached {
            Some(token) if Self::live(&token, now) => Some(token),
            Some(_) => {
                self.inner.by_client.remove(client_id);
                None
            }
            None => None,
        }
    }

    async fn by_token_id(&self, jti: &str) -> Option<Token> {
        let now = now_secs();
        let cached = self.inner.by_jti.get(jti).map(|e| e.clone());
        match cached {
            Some(token) if Self::live(&token, now) => Some(token),
            Some(_) => {
                self.inner.by_jti.remove(jti);
                None
            }
            None => None,
        }
    }

    async fn store_token(&self, token: &Token) {
        let client_id = token.client_id().to_owned();
        let jti = token.jti().to_owned();
        self.inner.by_client.insert(client_id.clone(), token.clone());
        self.inner.by_jti.insert(jti.clone(), token.clone());
        self.inner
            .client_jtis
            .entry(client_id)
            .or_default()
            .insert(jti);
    }

    async fn invalidate_by_client_id(&self, client_id: &str) -> usize {
        let now = now_secs();
        let mut removed = 0;

        if let Some((_, jtis)) = self.inner.client_jtis.remove(client_id) {
            for jti in jtis {
                if let Some((_, token)) = self.inner.by_jti.remove(&jti) {
                    self.revoke_jti(&jti, token.expires_at(), now);
                    removed += 1;
                }
            }
        }
        drop(self.inner.by_client.remove(client_id));
        removed
    }

    async fn invalidate_by_token_id(&self, jti: &str) -> bool {
        let now = now_secs();
        let Some((_, token)) = self.inner.by_jti.remove(jti) else {
            return false;
        };
        self.revoke_jti(jti, token.expires_at(), now);
        if let Some(mut jtis) = self.inner.client_jtis.get_mut(token.client_id()) {
            jtis.remove(jti);
        }
        // Drop the by-client entry only if it is this exact token.
        self.inner
            .by_client
            .remove_if(token.client_id(), |_, cached| cached.jti() == jti);
        true
    }

    async fn is_revoked(&self, jti: &str) -> bool {
        let now = now_secs();
        let exp = self.inner.revoked.get(jti).map(|e| *e);
        match exp {
            Some(exp) if exp > now => true,
            Some(_) => {
                self.inner.revoked.remove(jti);
                false
            }
            None => false,
        }
    }

    async fn negative_hit(&self, token: &str) -> bool {
        let now = now_secs();
        let until = self.inner.negative.get(token).map(|e| *e);
        match until {
            Some(until) if until > now => true,
            Some(_) => {
                self.inner.negative.remove(token);
                false
            }
            None => false,
        }
    }

    async fn store_negative(&self, token: &str) {
        let until = now_secs() + self.inner.negative_ttl_secs;
        self.inner.negative.insert(token.to_owned(), until);
    }

    async fn sweep_expired(&self) -> usize {
        let now = now_secs();
        let before = self.inner.by_client.len()
            + self.inner.by_jti.len()
            + self.inner.revoked.len()
            + self.inner.negative.len();

        self.inner.by_client.retain(|_, token| Self::live(token, now));
        self.inner.by_jti.retain(|_, token| Self::live(token, now));
        self.inner.revoked.retain(|_, exp| *exp > now);
        self.inner.negative.retain(|_, until| *until > now);
        self.inner.client_jtis.retain(|_, jtis| {
            jtis.retain(|jti| self.inner.by_jti.contains_key(jti));
            !jtis.is_empty()
        });

        let after = self.inner.by_client.len()
            + self.inner.by_jti.len()
            + self.inner.revoked.len()
            + self.inner.negative.len();
        before.saturating_sub(after)
    }

    async fn token_count(&self) -> usize {
        self.inner.by_jti.len()
    }
}

/// Bounded, time-limited credential fallback for vault outages.
#[derive(Clone)]
pub struct InMemoryCredentialCache {
    entries: Arc<DashMap<String, (Vec<CredentialRecord>, u64)>>,
    ttl_secs: u64,
}

impl InMemoryCredentialCache {
    /// `ttl_secs` is clamped to the 5-minute staleness bound.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl_secs: ttl_secs.min(CREDENTIAL_FALLBACK_MAX_TTL_SECS),
        }
    }
}

impl CredentialCache for InMemoryCredentialCache {
    async fn store(&self, client_id: &str, records: &[CredentialRecord]) {
        let until = now_secs() + self.ttl_secs;
        self.entries
            .insert(client_id.to_owned(), (records.to_vec(), until));
    }

    async fn get(&self, client_id: &str) -> Option<Vec<CredentialRecord>> {
        let now = now_secs();
        let cached = self.entries.get(client_id).map(|e| e.clone());
        match cached {
            Some((records, until)) if until > now => Some(records),
            Some(_) => {
                self.entries.remove(client_id);
                None
            }
            None => None,
        }
    }

    async fn remove(&self, client_id: &str) {
        self.entries.remove(client_id);
    }
}
