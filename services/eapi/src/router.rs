use axum::{
    Router,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use paygate_core::health::{health, liveness};
use paygate_core::middleware::{correlation_id_layer, propagate_correlation_id_layer};

use crate::handlers::{
    health::{detailed_health, readiness},
    payments::{create_payment, get_payment},
    rotations::{
        advance_rotation, cancel_rotation, complete_rotation, get_rotation,
        initiate_rotation, list_active_rotations, list_client_rotations,
    },
};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/api/v1/health", get(health))
        .route("/api/v1/health/detailed", get(detailed_health))
        .route("/api/v1/health/liveness", get(liveness))
        .route("/api/v1/health/readiness", get(readiness))
        // Payments (forwarded opaquely)
        .route("/api/v1/payments", post(create_payment))
        .route("/api/v1/payments/{id}", get(get_payment))
        // Rotation control (operator-scoped, not exposed externally)
        .route("/api/v1/rotations/initiate", post(initiate_rotation))
        .route("/api/v1/rotations/active", get(list_active_rotations))
        .route(
            "/api/v1/rotations/client/{client_id}",
            get(list_client_rotations),
        )
        .route(
            "/api/v1/rotations/{id}",
            get(get_rotation).delete(cancel_rotation),
        )
        .route("/api/v1/rotations/{id}/advance", put(advance_rotation))
        .route("/api/v1/rotations/{id}/complete", put(complete_rotation))
        .layer(
            ServiceBuilder::new()
                .layer(correlation_id_layer())
                .layer(TraceLayer::new_for_http())
                .layer(propagate_correlation_id_layer()),
        )
        .with_state(state)
}
