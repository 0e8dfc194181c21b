use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum_test::TestServer;

use paygate_eapi::config::EapiConfig;
use paygate_eapi::domain::ports::TokenCache;
use paygate_eapi::router::build_router;
use paygate_eapi::state::AppState;
use paygate_testing::token::{TEST_SIGNING_KEY, TestSigner};
use paygate_token::codec;

/// Mock downstream: records every bearer it sees and returns 401 for the
/// first `reject_first` calls, 200 afterwards.
#[derive(Clone)]
struct Downstream {
    bearers: Arc<Mutex<Vec<String>>>,
    calls: Arc<AtomicUsize>,
    reject_first: usize,
}

async fn downstream_payments(
    State(downstream): State<Downstream>,
    headers: HeaderMap,
) -> StatusCode {
    let bearer = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_owned();
    downstream.bearers.lock().unwrap().push(bearer);

    let call = downstream.calls.fetch_add(1, Ordering::SeqCst);
    if call < downstream.reject_first {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::OK
    }
}

/// Serve the mock downstream on an ephemeral port; returns its base URL.
async fn spawn_downstream(reject_first: usize) -> (String, Downstream) {
    let downstream = Downstream {
        bearers: Arc::new(Mutex::new(Vec::new())),
        calls: Arc::new(AtomicUsize::new(0)),
        reject_first,
    };
    let app = Router::new()
        .route("/internal/v1/payments", post(downstream_payments))
        .with_state(downstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), downstream)
}

fn config(downstream_url: &str) -> EapiConfig {
    EapiConfig {
        eapi_port: 0,
        signing_key: String::from_utf8(TEST_SIGNING_KEY.to_vec()).unwrap(),
        token_lifetime_secs: 3600,
        token_renewal_threshold_secs: 300,
        token_issuer: "payment-eapi".to_owned(),
        token_audience: "payment-sapi".to_owned(),
        token_allowed_issuers: vec!["payment-eapi".to_owned()],
        rotation_default_transition_minutes: 60,
        rotation_monitoring_interval_secs: 30,
        rotation_max_retry_attempts: 1,
        // the vault stays offline; the bearer path never touches it
        vault_url: "http://127.0.0.1:9".to_owned(),
        vault_api_key: "unused".to_owned(),
        vault_connection_timeout_ms: 200,
        vault_read_timeout_ms: 200,
        vault_retry_count: 1,
        vault_retry_backoff_multiplier: 2.0,
        cache_default_ttl_secs: 300,
        cache_negative_ttl_secs: 300,
        downstream_url: downstream_url.to_owned(),
        rotation_webhook_url: None,
    }
}

#[tokio::test]
async fn downstream_401_triggers_exactly_one_refresh_and_retry() {
    let (downstream_url, downstream) = spawn_downstream(1).await;
    let state = AppState::build(&config(&downstream_url)).unwrap();
    let server = TestServer::new(build_router(state.clone())).unwrap();

    let original = TestSigner::default().mint("vendor-a");
    let response = server
        .post("/api/v1/payments")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!("Bearer {original}")).unwrap(),
        )
        .add_header(
            http::HeaderName::from_static("x-idempotency-key"),
            http::HeaderValue::from_static("idem-401"),
        )
        .await;

    // The retry succeeded, so the caller sees the downstream 200.
    assert_eq!(response.status_code(), StatusCode::OK);

    // Exactly two downstream calls: the rejected original and one retry
    // carrying a freshly minted replacement with a new jti.
    let bearers = downstream.bearers.lock().unwrap().clone();
    assert_eq!(bearers.len(), 2);
    assert_eq!(bearers[0], original);
    assert_ne!(bearers[1], original);
    let original_jti = codec::parse(&original).unwrap().jti;
    let retry_claims = codec::parse(&bearers[1]).unwrap();
    assert_eq!(retry_claims.sub, "vendor-a");
    assert_ne!(retry_claims.jti, original_jti);

    // refresh() ran exactly once: the cache holds the replacement and the
    // original jti is revoked.
    let cached = state.cache.by_client_id("vendor-a").await.unwrap();
    assert_eq!(cached.token, bearers[1]);
    assert!(state.cache.is_revoked(&original_jti).await);
}

#[tokio::test]
async fn downstream_401_is_not_retried_more_than_once() {
    // Downstream rejects everything; the gateway must stop after one retry
    // and surface the second 401 as-is.
    let (downstream_url, downstream) = spawn_downstream(usize::MAX).await;
    let state = AppState::build(&config(&downstream_url)).unwrap();
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server
        .post("/api/v1/payments")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!(
                "Bearer {}",
                TestSigner::default().mint("vendor-a")
            ))
            .unwrap(),
        )
        .add_header(
            http::HeaderName::from_static("x-idempotency-key"),
            http::HeaderValue::from_static("idem-401-401"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_401_downstream_statuses_pass_through_without_retry() {
    // reject_first = 0 → the first call already returns 200.
    let (downstream_url, downstream) = spawn_downstream(0).await;
    let state = AppState::build(&config(&downstream_url)).unwrap();
    let server = TestServer::new(build_router(state)).unwrap();

    let response = server
        .post("/api/v1/payments")
        .add_header(
            http::HeaderName::from_static("authorization"),
            http::HeaderValue::from_str(&format!(
                "Bearer {}",
                TestSigner::default().mint("vendor-a")
            ))
            .unwrap(),
        )
        .add_header(
            http::HeaderName::from_static("x-idempotency-key"),
            http::HeaderValue::from_static("idem-200"),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(downstream.calls.load(Ordering::SeqCst), 1);
}
