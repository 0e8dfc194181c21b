use serde_json::json;
use tracing::{info, warn};

use crate::domain::ports::{Notifier, RotationEvent, RotationEventKind};

impl RotationEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "rotation_started",
            Self::StateChanged => "rotation_state_changed",
            Self::Completed => "rotation_completed",
            Self::Failed => "rotation_failed",
        }
    }
}

/// Fire-and-forget rotation notifications.
///
/// Always logs the event; additionally POSTs it to a webhook when one is
/// configured. Delivery runs on a detached task and failures are logged and
/// dropped — notification must never block state progression.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, event: RotationEvent) {
        info!(
            kind = event.kind.as_str(),
            rotation_id = %event.rotation.rotation_id,
            client_id = %event.rotation.client_id,
            state = ?event.rotation.current_state,
            "rotation notification"
        );

        let Some(url) = self.url.clone() else {
            return;
        };
        let http = self.http.clone();
        tokio::spawn(async move {
            let payload = json!({
                "kind": event.kind.as_str(),
                "rotation": event.rotation,
            });
            if let Err(e) = http.post(&url).json(&payload).send().await {
                warn!(error = %e, "rotation notification delivery failed");
            }
        });
    }
}
