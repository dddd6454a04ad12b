//! Ingress and history handlers

use super::ItemsResponse;
use crate::api::rest::state::AppState;
use crate::error::ApiResult;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use opsintel_pipeline::IngestRequest;
use opsintel_types::BusEvent;
use serde::Serialize;

/// Ingress acknowledgement
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub seq: u64,
}

/// Accept one telemetry event
///
/// Malformed JSON is rejected with `400 INVALID_PAYLOAD` before anything is published.
pub async fn ingest_event(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> ApiResult<Json<IngestResponse>> {
    let Json(request) = payload?;
    let published = state.pipeline.ingest(request);

    Ok(Json(IngestResponse {
        ok: true,
        seq: published.seq,
    }))
}

/// Buffered bus history, oldest first
pub async fn list_events(State(state): State<AppState>) -> Json<ItemsResponse<BusEvent>> {
    Json(ItemsResponse {
        items: state.pipeline.bus().recent_history(),
    })
}
