use crate::domain::ports::MetricsSink;
use crate::domain::types::RotationPhase;

/// Metrics sink that emits structured tracing events under the
/// `paygate::metrics` target; the collector agent scrapes them off the log
/// stream. The metrics backend itself stays outside the core.
#[derive(Clone, Default)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn auth_attempt(&self, client_id: &str, success: bool, degraded: bool, duration_ms: u128) {
        tracing::info!(
            target: "paygate::metrics",
            metric = "authentication.attempts",
            client_id,
            success,
            degraded,
            duration_ms = duration_ms as u64,
        );
    }

    fn token_validation(&self, valid: bool) {
        tracing::info!(
            target: "paygate::metrics",
            metric = "token.validation.count",
            valid,
        );
    }

    fn rotation_transition(&self, client_id: &str, state: RotationPhase) {
        tracing::info!(
            target: "paygate::metrics",
            metric = "rotation.transitions",
            client_id,
            state = ?state,
        );
    }
}
