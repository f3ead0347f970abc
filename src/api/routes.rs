use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::middleware::api_key_auth;
use crate::server::AppState;
use crate::triggers::http::{document_event, request_password_reset, run_reminders};

use super::health::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes(state: AppState) -> Router<AppState> {
    // Internal trigger endpoints, called by the document store's webhook
    let protected = Router::new()
        .route("/events", post(document_event))
        .route("/reminders/run", post(run_reminders))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Public callable used by the mobile app
        .route("/requestPasswordResetByNationalId", post(request_password_reset))
        .nest(
            "/api/v1",
            Router::new()
                .route("/password-reset", post(request_password_reset))
                .merge(protected),
        )
}
