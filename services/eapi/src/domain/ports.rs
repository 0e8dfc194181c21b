#![allow(async_fn_in_trait)]

use paygate_token::claims::Token;

use crate::domain::types::{CredentialRecord, Rotation, RotationPhase};

/// Outcome of a vault call. `Unavailable` is the only retryable kind.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    #[error("credential not found")]
    NotFound,
    #[error("vault unavailable: {0}")]
    Unavailable(String),
    #[error("vault denied the request")]
    Denied,
}

/// Port for the secret-management vault. The rotation controller is the only
/// writer; the credential validator uses the read paths.
pub trait VaultClient: Send + Sync {
    async fn retrieve(&self, client_id: &str) -> Result<CredentialRecord, VaultError>;

    fn retrieve_version(
        &self,
        client_id: &str,
        version: u32,
    ) -> impl std::future::Future<Output = Result<CredentialRecord, VaultError>> + Send;

    fn store(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
    ) -> impl std::future::Future<Output = Result<(), VaultError>> + Send;

    async fn store_new_version(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
        version: u32,
    ) -> Result<(), VaultError>;

    /// Configure the vault-side dual-validity window for a rotation.
    async fn configure_transition(
        &self,
        client_id: &str,
        old_version: u32,
        new_version: u32,
        window_secs: u64,
    ) -> Result<(), VaultError>;

    fn disable_version(
        &self,
        client_id: &str,
        version: u32,
    ) -> impl std::future::Future<Output = Result<(), VaultError>> + Send;

    fn remove_version(
        &self,
        client_id: &str,
        version: u32,
    ) -> impl std::future::Future<Output = Result<(), VaultError>> + Send;

    /// All currently active versions for a client (at most two).
    async fn get_active_versions(
        &self,
        client_id: &str,
    ) -> Result<Vec<CredentialRecord>, VaultError>;

    async fn is_available(&self) -> bool;
}

/// Port for the hot token cache: keyed by client id (mint reuse) and by jti
/// (revocation checks). Entries are ephemeral; expired-but-unevicted entries
/// read as absent.
pub trait TokenCache: Send + Sync {
    async fn by_client_id(&self, client_id: &str) -> Option<Token>;

    async fn by_token_id(&self, jti: &str) -> Option<Token>;

    /// Store under both keys with TTL = `exp - now`.
    async fn store_token(&self, token: &Token);

    /// Remove every cached token for the client and mark their jtis revoked
    /// until their original expiry. Returns the number removed; idempotent.
    fn invalidate_by_client_id(
        &self,
        client_id: &str,
    ) -> impl std::future::Future<Output = usize> + Send;

    async fn invalidate_by_token_id(&self, jti: &str) -> bool;

    async fn is_revoked(&self, jti: &str) -> bool;

    /// Negative cache of recently failed validations, keyed by the exact
    /// token string. Renewed tokens never hit it — their string differs.
    async fn negative_hit(&self, token: &str) -> bool;

    async fn store_negative(&self, token: &str);

    /// Evict expired entries across all maps; returns the number evicted.
    fn sweep_expired(&self) -> impl std::future::Future<Output = usize> + Send;

    /// Live token count, for the detailed health view.
    async fn token_count(&self) -> usize;
}

/// Port for the bounded, time-limited credential fallback used when the vault
/// is unreachable. Hits authenticate in degraded mode.
pub trait CredentialCache: Send + Sync {
    async fn store(&self, client_id: &str, records: &[CredentialRecord]);

    async fn get(&self, client_id: &str) -> Option<Vec<CredentialRecord>>;

    fn remove(&self, client_id: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// Rotation lifecycle notification, delivered fire-and-forget.
#[derive(Debug, Clone)]
pub struct RotationEvent {
    pub kind: RotationEventKind,
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationEventKind {
    Started,
    StateChanged,
    Completed,
    Failed,
}

/// Port for the external notification channel. Implementations must never
/// block or fail state progression; delivery errors are logged and dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: RotationEvent);
}

/// Port for the metrics backend. Implementations tag and forward; the
/// backend itself stays outside the core.
pub trait MetricsSink: Send + Sync {
    fn auth_attempt(&self, client_id: &str, success: bool, degraded: bool, duration_ms: u128);

    fn token_validation(&self, valid: bool);

    fn rotation_transition(&self, client_id: &str, state: RotationPhase);
}
