//! HTTP status handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use crate::application::hub::HubHandle;
use crate::application::session::SharedSessionRegistry;
use crate::domain::PatientRecord;

/// Shared state for the status routes
#[derive(Clone)]
pub struct ApiState {
    pub hub: HubHandle,
    pub registry: SharedSessionRegistry,
    pub started_at: Arc<Instant>,
    pub prometheus: PrometheusHandle,
}

/// Service health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: ConnectionCounts,
    pub patients: usize,
}

#[derive(Debug, Serialize)]
pub struct ConnectionCounts {
    pub total: usize,
    pub monitors: usize,
    pub sources: usize,
}

pub async fn health_check(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let uptime = state.started_at.elapsed().as_secs();
    let connections = ConnectionCounts {
        total: state.registry.count(),
        monitors: state.registry.monitor_count(),
        sources: state.registry.source_count(),
    };

    // The hub answering the snapshot query doubles as the liveness probe.
    let (status, patients, http_status) = match state.hub.snapshot().await {
        Ok(records) => ("ok", records.len(), StatusCode::OK),
        Err(_) => ("degraded", 0, StatusCode::SERVICE_UNAVAILABLE),
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            connections,
            patients,
        }),
    )
}

/// Read-only snapshot of every live patient record.
pub async fn list_patients(
    State(state): State<ApiState>,
) -> Result<Json<Vec<PatientRecord>>, StatusCode> {
    state
        .hub
        .snapshot()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<ApiState>) -> String {
    state.prometheus.render()
}
