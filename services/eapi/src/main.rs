use tracing::info;

use paygate_core::tracing::init_tracing;
use paygate_eapi::config::EapiConfig;
use paygate_eapi::router::build_router;
use paygate_eapi::state::AppState;

#[tokio::main]
async fn main() {
    init_tracing();

    let config = EapiConfig::from_env();

    let state = AppState::build(&config).expect("failed to build application state");
    // Detached on drop; the loop runs for the life of the process.
    let _scheduler = state
        .rotations
        .spawn_scheduler(config.rotation_monitoring_interval_secs);

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.eapi_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("payment eapi listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
