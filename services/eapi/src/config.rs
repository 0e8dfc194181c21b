/// Gateway configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EapiConfig {
    /// TCP port to listen on (default 8080). Env var: `EAPI_PORT`.
    pub eapi_port: u16,
    /// Process-wide HMAC key for signing internal tokens. Env var: `TOKEN_SIGNING_KEY`.
    pub signing_key: String,
    pub token_lifetime_secs: u64,
    /// Remaining life below which validation logs a renewal hint.
    pub token_renewal_threshold_secs: u64,
    pub token_issuer: String,
    pub token_audience: String,
    /// Issuers accepted at validation; defaults to just `token_issuer`.
    pub token_allowed_issuers: Vec<String>,
    pub rotation_default_transition_minutes: i64,
    pub rotation_monitoring_interval_secs: u64,
    pub rotation_max_retry_attempts: u32,
    /// Vault base URL (e.g. "http://vault:8200"). Env var: `VAULT_URL`.
    pub vault_url: String,
    pub vault_api_key: String,
    pub vault_connection_timeout_ms: u64,
    pub vault_read_timeout_ms: u64,
    pub vault_retry_count: u32,
    pub vault_retry_backoff_multiplier: f64,
    /// Credential fallback TTL; clamped to the 5-minute staleness bound.
    pub cache_default_ttl_secs: u64,
    pub cache_negative_ttl_secs: u64,
    /// Downstream payment service base URL. Env var: `DOWNSTREAM_URL`.
    pub downstream_url: String,
    /// Optional webhook for rotation notifications. Env var: `ROTATION_WEBHOOK_URL`.
    pub rotation_webhook_url: Option<String>,
}

fn required(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} is required"))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EapiConfig {
    pub fn from_env() -> Self {
        let token_issuer =
            std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "payment-eapi".to_owned());
        let token_allowed_issuers = std::env::var("TOKEN_ALLOWED_ISSUERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_owned())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec![token_issuer.clone()]);

        Self {
            eapi_port: parsed_or("EAPI_PORT", 8080),
            signing_key: required("TOKEN_SIGNING_KEY"),
            token_lifetime_secs: parsed_or("TOKEN_LIFETIME_SECONDS", 3600),
            token_renewal_threshold_secs: parsed_or("TOKEN_RENEWAL_THRESHOLD_SECONDS", 300),
            token_issuer,
            token_audience: std::env::var("TOKEN_AUDIENCE")
                .unwrap_or_else(|_| "payment-sapi".to_owned()),
            token_allowed_issuers,
            rotation_default_transition_minutes: parsed_or(
                "ROTATION_DEFAULT_TRANSITION_PERIOD_MINUTES",
                60,
            ),
            rotation_monitoring_interval_secs: parsed_or("ROTATION_MONITORING_INTERVAL_SECONDS", 30),
            rotation_max_retry_attempts: parsed_or("ROTATION_MAX_RETRY_ATTEMPTS", 3),
            vault_url: required("VAULT_URL"),
            vault_api_key: required("VAULT_API_KEY"),
            vault_connection_timeout_ms: parsed_or("VAULT_CONNECTION_TIMEOUT_MS", 3000),
            vault_read_timeout_ms: parsed_or("VAULT_READ_TIMEOUT_MS", 5000),
            vault_retry_count: parsed_or("VAULT_RETRY_COUNT", 3),
            vault_retry_backoff_multiplier: parsed_or("VAULT_RETRY_BACKOFF_MULTIPLIER", 2.0),
            cache_default_ttl_secs: parsed_or("CACHE_DEFAULT_TTL_SECONDS", 300),
            cache_negative_ttl_secs: parsed_or("CACHE_NEGATIVE_TTL_SECONDS", 300),
            downstream_url: required("DOWNSTREAM_URL"),
            rotation_webhook_url: std::env::var("ROTATION_WEBHOOK_URL").ok(),
        }
    }

    /// Negative-cache TTL bounded to a third of the nominal token lifetime.
    pub fn effective_negative_ttl_secs(&self) -> u64 {
        self.cache_negative_ttl_secs
            .min(self.token_lifetime_secs / 3)
    }
}
