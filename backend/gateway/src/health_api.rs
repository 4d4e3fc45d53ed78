//! Liveness endpoints.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub uptime_seconds: u64,
    pub online_users: usize,
    pub timestamp: DateTime<Utc>,
}

/// Handler for `GET /api/health`
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    let now = Utc::now();
    let uptime_seconds = (now - state.started_at).num_seconds().max(0) as u64;

    Json(HealthReport {
        status: "ok".into(),
        uptime_seconds,
        online_users: state.registry.len().await,
        timestamp: now,
    })
}

/// Handler for `GET /ping`
pub async fn ping() -> Json<Value> {
    Json(json!({ "msg": "Ping Successful" }))
}
