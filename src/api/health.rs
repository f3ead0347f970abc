//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::{BatchErrorPolicy, DispatcherStatsSnapshot};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    pub push: PushHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct PushHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub dispatch: DispatchSettings,
    pub notifications: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct DispatchSettings {
    pub batch_size: usize,
    pub on_batch_error: BatchErrorPolicy,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match &state.redis {
        Some(pool) => {
            let connected = match pool.ping().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Redis health check failed");
                    false
                }
            };
            Some(RedisHealthResponse {
                status: if connected { "connected" } else { "disconnected" }.to_string(),
                connected,
            })
        }
        None => None,
    };

    let degraded = redis.as_ref().is_some_and(|r| !r.connected);
    let status = if degraded { "degraded" } else { "healthy" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.stores.backend.to_string(),
        },
        push: PushHealthResponse {
            backend: state.push_backend.to_string(),
        },
        redis,
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let dispatcher = state.triggers.pipeline().dispatcher();
    let config = dispatcher.config();

    Json(StatsResponse {
        dispatch: DispatchSettings {
            batch_size: config.effective_batch_size(),
            on_batch_error: config.on_batch_error,
        },
        notifications: dispatcher.stats(),
    })
}
