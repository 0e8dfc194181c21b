use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is unset: gateway crates at debug so auth
/// and rotation decisions are visible, the metrics event stream and
/// everything else at info.
const DEFAULT_DIRECTIVES: &str = "info,paygate_eapi=debug,paygate::metrics=info";

/// Initialize structured JSON tracing for a gateway process.
///
/// One line per event, span context omitted — the collector joins lines on
/// the `x-correlation-id` field instead. `RUST_LOG` overrides
/// [`DEFAULT_DIRECTIVES`] when set. Safe to call multiple times; only the
/// first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(false))
        .try_init();
}
