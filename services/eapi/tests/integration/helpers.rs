use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use paygate_eapi::domain::ports::{
    MetricsSink, Notifier, RotationEvent, VaultClient, VaultError,
};
use paygate_eapi::domain::types::{CredentialRecord, CredentialState, RotationPhase};
use paygate_eapi::infra::cache::{InMemoryCredentialCache, InMemoryTokenCache};
use paygate_eapi::usecase::authenticate::{AuthenticationService, TokenSettings};
use paygate_eapi::usecase::credential::CredentialValidator;
use paygate_eapi::usecase::rotation::{RotationManager, RotationSettings};
use paygate_token::crypto::hash_credential;
pub use paygate_testing::token::TEST_SIGNING_KEY;

// ── MockVault ────────────────────────────────────────────────────────────────

/// In-memory vault keyed by `(client_id, version)`, with scripted
/// availability and call counters.
#[derive(Clone)]
pub struct MockVault {
    records: Arc<Mutex<HashMap<(String, u32), CredentialRecord>>>,
    available: Arc<AtomicBool>,
    pub active_version_calls: Arc<AtomicUsize>,
    pub transition_calls: Arc<AtomicUsize>,
}

impl MockVault {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            active_version_calls: Arc::new(AtomicUsize::new(0)),
            transition_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn seed(&self, record: CredentialRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((record.client_id.clone(), record.version), record);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<(), VaultError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(VaultError::Unavailable("connection refused".to_owned()))
        }
    }
}

impl VaultClient for MockVault {
    async fn retrieve(&self, client_id: &str) -> Result<CredentialRecord, VaultError> {
        self.guard()?;
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.client_id == client_id && r.active)
            .max_by_key(|r| r.version)
            .cloned()
            .ok_or(VaultError::NotFound)
    }

    async fn retrieve_version(
        &self,
        client_id: &str,
        version: u32,
    ) -> Result<CredentialRecord, VaultError> {
        self.guard()?;
        self.records
            .lock()
            .unwrap()
            .get(&(client_id.to_owned(), version))
            .cloned()
            .ok_or(VaultError::NotFound)
    }

    async fn store(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
    ) -> Result<(), VaultError> {
        self.guard()?;
        self.records
            .lock()
            .unwrap()
            .insert((client_id.to_owned(), credential.version), credential.clone());
        Ok(())
    }

    async fn store_new_version(
        &self,
        client_id: &str,
        credential: &CredentialRecord,
        version: u32,
    ) -> Result<(), VaultError> {
        self.guard()?;
        self.records
            .lock()
            .unwrap()
            .insert((client_id.to_owned(), version), credential.clone());
        Ok(())
    }

    async fn configure_transition(
        &self,
        _client_id: &str,
        _old_version: u32,
        _new_version: u32,
        _window_secs: u64,
    ) -> Result<(), VaultError> {
        self.guard()?;
        self.transition_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn disable_version(&self, client_id: &str, version: u32) -> Result<(), VaultError> {
        self.guard()?;
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&(client_id.to_owned(), version)) {
            Some(record) => {
                record.active = false;
                Ok(())
            }
            None => Err(VaultError::NotFound),
        }
    }

    async fn remove_version(&self, client_id: &str, version: u32) -> Result<(), VaultError> {
        self.guard()?;
        // idempotent delete
        self.records
            .lock()
            .unwrap()
            .remove(&(client_id.to_owned(), version));
        Ok(())
    }

    async fn get_active_versions(
        &self,
        client_id: &str,
    ) -> Result<Vec<CredentialRecord>, VaultError> {
        self.guard()?;
        self.active_version_calls.fetch_add(1, Ordering::SeqCst);
        let mut versions: Vec<CredentialRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.client_id == client_id && r.active)
            .cloned()
            .collect();
        versions.sort_by_key(|r| r.version);
        Ok(versions)
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

// ── RecordingMetrics ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingMetrics {
    /// (client_id, success, degraded) per authentication attempt.
    pub auth_attempts: Arc<Mutex<Vec<(String, bool, bool)>>>,
    pub validations: Arc<Mutex<Vec<bool>>>,
}

impl RecordingMetrics {
    pub fn attempts_for(&self, client_id: &str) -> Vec<(String, bool, bool)> {
        self.auth_attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| id == client_id)
            .cloned()
            .collect()
    }

    pub fn validation_counts(&self) -> (usize, usize) {
        let validations = self.validations.lock().unwrap();
        let valid = validations.iter().filter(|v| **v).count();
        (valid, validations.len() - valid)
    }
}

impl MetricsSink for RecordingMetrics {
    fn auth_attempt(&self, client_id: &str, success: bool, degraded: bool, _duration_ms: u128) {
        self.auth_attempts
            .lock()
            .unwrap()
            .push((client_id.to_owned(), success, degraded));
    }

    fn token_validation(&self, valid: bool) {
        self.validations.lock().unwrap().push(valid);
    }

    fn rotation_transition(&self, _client_id: &str, _state: RotationPhase) {}
}

// ── RecordingNotifier ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub events: Arc<Mutex<Vec<RotationEvent>>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<paygate_eapi::domain::ports::RotationEventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: RotationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub type TestAuthService = AuthenticationService<
    MockVault,
    InMemoryCredentialCache,
    InMemoryTokenCache,
    RecordingMetrics,
>;

pub type TestRotations = RotationManager<
    MockVault,
    InMemoryCredentialCache,
    InMemoryTokenCache,
    RecordingNotifier,
    RecordingMetrics,
>;

pub struct TestHarness {
    pub vault: MockVault,
    pub cache: InMemoryTokenCache,
    pub fallback: InMemoryCredentialCache,
    pub metrics: RecordingMetrics,
    pub notifier: RecordingNotifier,
    pub auth: Arc<TestAuthService>,
    pub rotations: Arc<TestRotations>,
}

pub fn token_settings() -> TokenSettings {
    TokenSettings {
        signing_key: TEST_SIGNING_KEY.to_vec(),
        lifetime_secs: 3600,
        renewal_threshold_secs: 300,
        issuer: "payment-eapi".to_owned(),
        audience: "payment-sapi".to_owned(),
        allowed_issuers: vec!["payment-eapi".to_owned()],
    }
}

pub fn harness() -> TestHarness {
    let vault = MockVault::new();
    let cache = InMemoryTokenCache::new(60);
    let fallback = InMemoryCredentialCache::new(300);
    let metrics = RecordingMetrics::default();
    let notifier = RecordingNotifier::default();

    let auth = Arc::new(AuthenticationService::new(
        CredentialValidator {
            vault: vault.clone(),
            fallback: fallback.clone(),
        },
        cache.clone(),
        metrics.clone(),
        token_settings(),
    ));
    let rotations = Arc::new(RotationManager::new(
        vault.clone(),
        fallback.clone(),
        cache.clone(),
        notifier.clone(),
        metrics.clone(),
        RotationSettings {
            default_transition_minutes: 60,
            // keep scheduler failure paths fast in tests
            max_retry_attempts: 1,
        },
    ));

    TestHarness {
        vault,
        cache,
        fallback,
        metrics,
        notifier,
        auth,
        rotations,
    }
}

pub fn credential(client_id: &str, secret: &str, version: u32) -> CredentialRecord {
    CredentialRecord {
        client_id: client_id.to_owned(),
        hashed_secret: hash_credential(secret),
        version,
        active: true,
        rotation_state: CredentialState::None,
        permissions: vec!["payments:write".to_owned(), "payments:read".to_owned()],
        created_at: Utc::now(),
        expires_at: None,
    }
}
