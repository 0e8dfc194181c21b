use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Rotation marker stamped on a stored credential version.
///
/// During a rotation exactly one of a client's two active versions carries
/// `DualActive` (then `OldDeprecated`); outside rotation every version is
/// `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    None,
    DualActive,
    OldDeprecated,
}

/// One stored version of a client credential.
///
/// The plaintext secret never leaves the vault boundary; `hashed_secret` is
/// the salted-SHA-256 stored form produced by `paygate_token::crypto`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub client_id: String,
    pub hashed_secret: String,
    pub version: u32,
    pub active: bool,
    pub rotation_state: CredentialState,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Rotation lifecycle phases. `NewActive` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    Initiated,
    DualActive,
    OldDeprecated,
    NewActive,
    Failed,
}

impl RotationPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::NewActive | Self::Failed)
    }

    /// Legal forward edges of the state machine. Any non-terminal phase may
    /// additionally fail.
    pub fn can_advance_to(self, target: RotationPhase) -> bool {
        matches!(
            (self, target),
            (Self::Initiated, Self::DualActive)
                | (Self::DualActive, Self::OldDeprecated)
                | (Self::OldDeprecated, Self::NewActive)
        ) || (!self.is_terminal() && target == Self::Failed)
    }

    /// The next phase on the success path, if any.
    pub fn next(self) -> Option<RotationPhase> {
        match self {
            Self::Initiated => Some(Self::DualActive),
            Self::DualActive => Some(Self::OldDeprecated),
            Self::OldDeprecated => Some(Self::NewActive),
            Self::NewActive | Self::Failed => None,
        }
    }
}

/// A credential rotation for one client.
///
/// Credential versions are referenced by `(client_id, version)` only — the
/// vault owns the records themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub rotation_id: Uuid,
    pub client_id: String,
    pub current_state: RotationPhase,
    pub target_state: RotationPhase,
    pub old_version: u32,
    pub new_version: u32,
    /// Dual-active window before automatic deprecation, seconds.
    pub transition_period_secs: i64,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Rotation {
    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }

    /// True once the dual-active window has fully elapsed at `now`.
    pub fn window_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.started_at + Duration::seconds(self.transition_period_secs)
    }

    /// True once the post-deprecation grace (same length as the window) has
    /// elapsed at `now`.
    pub fn grace_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.deprecated_at {
            Some(at) => now >= at + Duration::seconds(self.transition_period_secs),
            None => false,
        }
    }
}

/// Default permissions granted to a credential created outside rotation
/// (rotation copies the permissions of the version it replaces).
pub const DEFAULT_PERMISSIONS: &[&str] = &["payments:read", "payments:write"];

/// Generated secret length for rotated credentials.
pub const ROTATED_SECRET_LEN: usize = 32;

/// Upper bound on the credential fallback cache TTL.
pub const CREDENTIAL_FALLBACK_MAX_TTL_SECS: u64 = 300;
