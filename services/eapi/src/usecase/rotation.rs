use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};
use uuid::Uuid;

use paygate_token::crypto::{hash_credential, secure_random_string};

use crate::domain::ports::{
    CredentialCache, MetricsSink, Notifier, RotationEvent, RotationEventKind, TokenCache,
    VaultClient,
};
use crate::domain::types::{
    CredentialRecord, CredentialState, ROTATED_SECRET_LEN, Rotation, RotationPhase,
};
use crate::error::GatewayError;

/// Rotation settings fixed at startup.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    pub default_transition_minutes: i64,
    pub max_retry_attempts: u32,
}

/// Result of initiating a rotation. `new_secret` is the plaintext handed to
/// the operator exactly once; only its hash is stored.
#[derive(Debug)]
pub struct InitiatedRotation {
    pub rotation: Rotation,
    pub new_secret: String,
}

/// Pause between scheduler-side advancement retries.
const ADVANCE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Owns every rotation object and serializes mutations per rotation.
///
/// Credential versions are referenced by `(client_id, version)` only; the
/// vault owns the records. At most one non-terminal rotation exists per
/// client at any time.
pub struct RotationManager<V, F, C, N, M> {
    vault: V,
    fallback: F,
    cache: C,
    notifier: N,
    metrics: M,
    settings: RotationSettings,
    rotations: DashMap<Uuid, Arc<Mutex<Rotation>>>,
    active_by_client: DashMap<String, Uuid>,
}

impl<V, F, C, N, M> RotationManager<V, F, C, N, M>
where
    V: VaultClient,
    F: CredentialCache,
    C: TokenCache,
    N: Notifier,
    M: MetricsSink,
{
    pub fn new(vault: V, fallback: F, cache: C, notifier: N, metrics: M, settings: RotationSettings) -> Self {
        Self {
            vault,
            fallback,
            cache,
            notifier,
            metrics,
            settings,
            rotations: DashMap::new(),
            active_by_client: DashMap::new(),
        }
    }

    fn emit(&self, kind: RotationEventKind, rotation: &Rotation) {
        self.notifier.notify(RotationEvent {
            kind,
            rotation: rotation.clone(),
        });
        self.metrics
            .rotation_transition(&rotation.client_id, rotation.current_state);
    }

    /// Begin a rotation for `client_id`: write a fresh hashed secret as the
    /// next version, configure the vault-side transition window, and enter
    /// `DualActive` — both secrets authenticate from here on.
    pub async fn initiate(
        &self,
        client_id: &str,
        reason: &str,
        transition_minutes: Option<i64>,
        force: bool,
    ) -> Result<InitiatedRotation, GatewayError> {
        let rotation_id = Uuid::new_v4();

        // Claim the per-client slot first so concurrent initiations conflict
        // before any vault mutation happens.
        match self.active_by_client.entry(client_id.to_owned()) {
            Entry::Occupied(existing) => {
                let existing_id = *existing.get();
                drop(existing);
                if !force {
                    return Err(GatewayError::RotationConflict);
                }
                warn!(client_id, %existing_id, "force-cancelling active rotation");
                self.cancel(existing_id, "superseded by forced rotation")
                    .await?;
                // Re-claim after the cancel released the slot.
                match self.active_by_client.entry(client_id.to_owned()) {
                    Entry::Occupied(_) => return Err(GatewayError::RotationConflict),
                    Entry::Vacant(slot) => {
                        slot.insert(rotation_id);
                    }
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(rotation_id);
            }
        }

        match self.initiate_in_vault(rotation_id, client_id, reason, transition_minutes).await {
            Ok(initiated) => Ok(initiated),
            Err(err) => {
                self.active_by_client.remove(client_id);
                Err(err)
            }
        }
    }

    async fn initiate_in_vault(
        &self,
        rotation_id: Uuid,
        client_id: &str,
        reason: &str,
        transition_minutes: Option<i64>,
    ) -> Result<InitiatedRotation, GatewayError> {
        let current = self.vault.retrieve(client_id).await?;
        let old_version = current.version;
        let new_version = old_version + 1;
        let transition_minutes =
            transition_minutes.unwrap_or(self.settings.default_transition_minutes);
        let transition_period_secs = transition_minutes * 60;

        let new_secret = secure_random_string(ROTATED_SECRET_LEN);
        let new_record = CredentialRecord {
            client_id: client_id.to_owned(),
            hashed_secret: hash_credential(&new_secret),
            version: new_version,
            active: true,
            rotation_state: CredentialState::None,
            permissions: current.permissions.clone(),
            created_at: Utc::now(),
            expires_at: None,
        };
        self.vault
            .store_new_version(client_id, &new_record, new_version)
            .await?;

        if let Err(err) = self
            .configure_and_mark_dual(client_id, current, old_version, new_version, transition_period_secs)
            .await
        {
            // Roll back the version that never became visible.
            if let Err(cleanup) = self.vault.remove_version(client_id, new_version).await {
                warn!(client_id, new_version, error = %cleanup, "rollback of new version failed");
            }
            return Err(err);
        }
        self.fallback.remove(client_id).await;

        let mut rotation = Rotation {
            rotation_id,
            client_id: client_id.to_owned(),
            current_state: RotationPhase::Initiated,
            target_state: RotationPhase::NewActive,
            old_version,
            new_version,
            transition_period_secs,
            started_at: Utc::now(),
            deprecated_at: None,
            completed_at: None,
            success: None,
            message: Some(reason.to_owned()),
        };
        self.emit(RotationEventKind::Started, &rotation);

        // The new version is live in the vault, so dual-active holds already.
        rotation.current_state = RotationPhase::DualActive;
        self.emit(RotationEventKind::StateChanged, &rotation);

        self.rotations
            .insert(rotation_id, Arc::new(Mutex::new(rotation.clone())));
        Ok(InitiatedRotation {
            rotation,
            new_secret,
        })
    }

    async fn configure_and_mark_dual(
        &self,
        client_id: &str,
        mut old_record: CredentialRecord,
        old_version: u32,
        new_version: u32,
        transition_period_secs: i64,
    ) -> Result<(), GatewayError> {
        self.vault
            .configure_transition(
                client_id,
                old_version,
                new_version,
                transition_period_secs.max(0) as u64,
            )
            .await?;
        old_record.rotation_state = CredentialState::DualActive;
        self.vault.store(client_id, &old_record).await?;
        Ok(())
    }

    /// Advance a rotation to `target`. Advancing to the current state is a
    /// no-op; anything off the permitted graph is rejected.
    pub async fn advance(
        &self,
        rotation_id: Uuid,
        target: RotationPhase,
    ) -> Result<Rotation, GatewayError> {
        let entry = self
            .rotations
            .get(&rotation_id)
            .map(|e| e.clone())
            .ok_or(GatewayError::RotationNotFound)?;
        let mut rotation = entry.lock().await;
        self.advance_locked(&mut rotation, target, "cancelled by operator")
            .await?;
        Ok(rotation.clone())
    }

    /// Operator shortcut: advance one legal step toward `NewActive`.
    pub async fn complete(&self, rotation_id: Uuid) -> Result<Rotation, GatewayError> {
        let entry = self
            .rotations
            .get(&rotation_id)
            .map(|e| e.clone())
            .ok_or(GatewayError::RotationNotFound)?;
        let mut rotation = entry.lock().await;
        let target = rotation
            .current_state
            .next()
            .ok_or(GatewayError::IllegalTransition)?;
        self.advance_locked(&mut rotation, target, "cancelled by operator")
            .await?;
        Ok(rotation.clone())
    }

    /// Cancel a rotation, rolling back the unpromoted new version.
    pub async fn cancel(&self, rotation_id: Uuid, reason: &str) -> Result<Rotation, GatewayError> {
        let entry = self
            .rotations
            .get(&rotation_id)
            .map(|e| e.clone())
            .ok_or(GatewayError::RotationNotFound)?;
        let mut rotation = entry.lock().await;
        self.advance_locked(&mut rotation, RotationPhase::Failed, reason)
            .await?;
        Ok(rotation.clone())
    }

    async fn advance_locked(
        &self,
        rotation: &mut Rotation,
        target: RotationPhase,
        failure_message: &str,
    ) -> Result<(), GatewayError> {
        if rotation.current_state == target {
            return Ok(());
        }
        if !rotation.current_state.can_advance_to(target) {
            return Err(GatewayError::IllegalTransition);
        }
        match target {
            RotationPhase::DualActive => {
                rotation.current_state = RotationPhase::DualActive;
                self.emit(RotationEventKind::StateChanged, rotation);
            }
            RotationPhase::OldDeprecated => self.deprecate_old(rotation).await?,
            RotationPhase::NewActive => self.promote_new(rotation).await?,
            RotationPhase::Failed => self.fail(rotation, failure_message).await,
            RotationPhase::Initiated => return Err(GatewayError::IllegalTransition),
        }
        Ok(())
    }

    /// `DualActive → OldDeprecated`: mark the old version deprecated in the
    /// vault. It is still accepted by the validator; tokens stay untouched.
    async fn deprecate_old(&self, rotation: &mut Rotation) -> Result<(), GatewayError> {
        let mut old = self
            .vault
            .retrieve_version(&rotation.client_id, rotation.old_version)
            .await?;
        old.rotation_state = CredentialState::OldDeprecated;
        self.vault.store(&rotation.client_id, &old).await?;
        self.fallback.remove(&rotation.client_id).await;

        rotation.current_state = RotationPhase::OldDeprecated;
        rotation.deprecated_at = Some(Utc::now());
        self.emit(RotationEventKind::StateChanged, rotation);
        Ok(())
    }

    /// `OldDeprecated → NewActive`: disable the old version and purge the
    /// client's cached tokens so everything re-mints under the new secret.
    async fn promote_new(&self, rotation: &mut Rotation) -> Result<(), GatewayError> {
        self.vault
            .disable_version(&rotation.client_id, rotation.old_version)
            .await?;
        self.fallback.remove(&rotation.client_id).await;
        let purged = self.cache.invalidate_by_client_id(&rotation.client_id).await;
        debug!(
            client_id = %rotation.client_id,
            purged,
            "rotation completed, cached tokens purged"
        );

        rotation.current_state = RotationPhase::NewActive;
        rotation.completed_at = Some(Utc::now());
        rotation.success = Some(true);
        self.active_by_client.remove(&rotation.client_id);
        self.emit(RotationEventKind::Completed, rotation);
        Ok(())
    }

    /// Terminal failure: best-effort rollback of the never-promoted new
    /// version, then purge any tokens minted during the rotation.
    async fn fail(&self, rotation: &mut Rotation, message: &str) {
        if let Err(err) = self
            .vault
            .remove_version(&rotation.client_id, rotation.new_version)
            .await
        {
            warn!(
                client_id = %rotation.client_id,
                new_version = rotation.new_version,
                error = %err,
                "rollback of new version failed"
            );
        }
        // Clear the dual-active marker on the surviving old version.
        match self
            .vault
            .retrieve_version(&rotation.client_id, rotation.old_version)
            .await
        {
            Ok(mut old) => {
                old.rotation_state = CredentialState::None;
                if let Err(err) = self.vault.store(&rotation.client_id, &old).await {
                    warn!(client_id = %rotation.client_id, error = %err, "restore of old version failed");
                }
            }
            Err(err) => {
                warn!(client_id = %rotation.client_id, error = %err, "old version unreadable during rollback");
            }
        }
        self.fallback.remove(&rotation.client_id).await;
        self.cache.invalidate_by_client_id(&rotation.client_id).await;

        rotation.current_state = RotationPhase::Failed;
        rotation.target_state = RotationPhase::Failed;
        rotation.completed_at = Some(Utc::now());
        rotation.success = Some(false);
        rotation.message = Some(message.to_owned());
        self.active_by_client.remove(&rotation.client_id);
        self.emit(RotationEventKind::Failed, rotation);
    }

    /// Advance every rotation whose window has elapsed. Vault trouble is
    /// retried a bounded number of times before the rotation is failed.
    pub async fn check_progress(&self) {
        let now = Utc::now();
        let ids: Vec<Uuid> = self.rotations.iter().map(|e| *e.key()).collect();

        for id in ids {
            let Some(entry) = self.rotations.get(&id).map(|e| e.clone()) else {
                continue;
            };
            let mut rotation = entry.lock().await;
            let target = match rotation.current_state {
                RotationPhase::DualActive if rotation.window_elapsed(now) => {
                    RotationPhase::OldDeprecated
                }
                RotationPhase::OldDeprecated if rotation.grace_elapsed(now) => {
                    RotationPhase::NewActive
                }
                _ => continue,
            };
            self.advance_with_retry(&mut rotation, target).await;
        }
    }

    async fn advance_with_retry(&self, rotation: &mut Rotation, target: RotationPhase) {
        let attempts = self.settings.max_retry_attempts.max(1);
        for attempt in 0..attempts {
            match self.advance_locked(rotation, target, "").await {
                Ok(()) => return,
                Err(GatewayError::VaultUnavailable) if attempt + 1 < attempts => {
                    warn!(
                        rotation_id = %rotation.rotation_id,
                        attempt,
                        "vault unavailable during advancement, retrying"
                    );
                    tokio::time::sleep(ADVANCE_RETRY_DELAY).await;
                }
                Err(err) => {
                    error!(
                        rotation_id = %rotation.rotation_id,
                        error = %err,
                        "rotation advancement failed"
                    );
                    self.fail(rotation, &format!("advancement failed: {err}"))
                        .await;
                    return;
                }
            }
        }
        self.fail(rotation, "vault unavailable during advancement")
            .await;
    }

    pub async fn get(&self, rotation_id: Uuid) -> Option<Rotation> {
        let entry = self.rotations.get(&rotation_id).map(|e| e.clone())?;
        let rotation = entry.lock().await;
        Some(rotation.clone())
    }

    pub async fn list_for_client(&self, client_id: &str) -> Vec<Rotation> {
        let entries: Vec<Arc<Mutex<Rotation>>> =
            self.rotations.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for entry in entries {
            let rotation = entry.lock().await;
            if rotation.client_id == client_id {
                out.push(rotation.clone());
            }
        }
        out.sort_by_key(|r| r.started_at);
        out
    }

    pub async fn list_active(&self) -> Vec<Rotation> {
        let entries: Vec<Arc<Mutex<Rotation>>> =
            self.rotations.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::new();
        for entry in entries {
            let rotation = entry.lock().await;
            if !rotation.is_terminal() {
                out.push(rotation.clone());
            }
        }
        out.sort_by_key(|r| r.started_at);
        out
    }

    pub fn active_count(&self) -> usize {
        self.active_by_client.len()
    }
}

impl<V, F, C, N, M> RotationManager<V, F, C, N, M>
where
    V: VaultClient + Send + Sync + 'static,
    F: CredentialCache + Send + Sync + 'static,
    C: TokenCache + Send + Sync + 'static,
    N: Notifier + Send + Sync + 'static,
    M: MetricsSink + Send + Sync + 'static,
{
    /// Spawn the periodic progress loop: advance due rotations and sweep
    /// expired cache entries. The loop never exits; errors are logged inside
    /// `check_progress`.
    pub fn spawn_scheduler(self: &Arc<Self>, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                manager.check_progress().await;
                let swept = manager.cache.sweep_expired().await;
                if swept > 0 {
                    debug!(swept, "evicted expired cache entries");
                }
            }
        })
    }
}
