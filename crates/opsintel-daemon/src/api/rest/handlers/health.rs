//! Health and status handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use opsintel_pipeline::WorkflowStats;
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub bus: BusStatus,
    pub detector: DetectorStatus,
    pub workflows: WorkflowStats,
    pub decisions: DecisionStatus,
}

#[derive(Debug, Serialize)]
pub struct BusStatus {
    pub last_seq: u64,
    pub buffered: usize,
    pub subscribers: usize,
    pub evicted_subscribers: u64,
}

#[derive(Debug, Serialize)]
pub struct DetectorStatus {
    pub tracked_series: usize,
    pub evicted_series: u64,
}

#[derive(Debug, Serialize)]
pub struct DecisionStatus {
    pub retained: usize,
    pub total_recorded: u64,
    pub chain_valid: bool,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    let pipeline = &state.pipeline;
    let bus = pipeline.bus().stats();
    let detector = pipeline.detector().stats();
    let decisions = pipeline.decisions();

    Json(DaemonStatusResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        bus: BusStatus {
            last_seq: bus.last_seq,
            buffered: bus.buffered,
            subscribers: bus.subscribers,
            evicted_subscribers: bus.evicted_subscribers,
        },
        detector: DetectorStatus {
            tracked_series: detector.tracked_series,
            evicted_series: detector.evicted_series,
        },
        workflows: pipeline.workflows().stats(),
        decisions: DecisionStatus {
            retained: decisions.len(),
            total_recorded: decisions.total_appended(),
            chain_valid: decisions.verify_chain().valid,
        },
    })
}
