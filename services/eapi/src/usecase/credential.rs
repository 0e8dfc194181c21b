use tracing::warn;

use paygate_token::crypto::verify_credential;

use crate::domain::ports::{CredentialCache, VaultClient, VaultError};
use crate::domain::types::{CredentialRecord, CredentialState};
use crate::error::GatewayError;

/// Result of a successful credential check.
#[derive(Debug, Clone)]
pub struct ValidatedCredential {
    pub version: u32,
    pub rotation_state: CredentialState,
    pub permissions: Vec<String>,
    /// True when the check ran against the local fallback because the vault
    /// was unreachable.
    pub degraded: bool,
}

/// Validates `(client_id, secret)` pairs against the vault's active versions.
///
/// Reads go through the vault; successful reads refresh the bounded fallback
/// cache so a vault outage degrades rather than fails.
pub struct CredentialValidator<V, F> {
    pub vault: V,
    pub fallback: F,
}

impl<V, F> CredentialValidator<V, F>
where
    V: VaultClient,
    F: CredentialCache,
{
    async fn active_versions(
        &self,
        client_id: &str,
    ) -> Result<(Vec<CredentialRecord>, bool), GatewayError> {
        match self.vault.get_active_versions(client_id).await {
            Ok(records) => {
                self.fallback.store(client_id, &records).await;
                Ok((records, false))
            }
            Err(VaultError::Unavailable(detail)) => match self.fallback.get(client_id).await {
                Some(records) => {
                    warn!(client_id, %detail, "vault unavailable, using credential fallback");
                    Ok((records, true))
                }
                None => Err(GatewayError::VaultUnavailable),
            },
            Err(err) => Err(err.into()),
        }
    }

    /// Check a presented secret against every active version.
    ///
    /// The whole version set is evaluated even after a match so response
    /// timing does not reveal which version was tried.
    pub async fn verify(
        &self,
        client_id: &str,
        secret: &str,
    ) -> Result<ValidatedCredential, GatewayError> {
        let (records, degraded) = self.active_versions(client_id).await?;

        let mut matched: Option<&CredentialRecord> = None;
        for record in &records {
            let ok = verify_credential(secret, &record.hashed_secret);
            if ok && matched.is_none() {
                matched = Some(record);
            }
        }

        match matched {
            Some(record) => Ok(ValidatedCredential {
                version: record.version,
                rotation_state: record.rotation_state,
                permissions: record.permissions.clone(),
                degraded,
            }),
            None => Err(GatewayError::InvalidCredentials),
        }
    }
}
