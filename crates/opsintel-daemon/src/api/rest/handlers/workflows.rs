//! Workflow control handlers

use super::ItemsResponse;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use opsintel_types::{WorkflowDraft, WorkflowId, WorkflowItem, WorkflowTransition, SYSTEM_ACTOR};
use serde::{Deserialize, Serialize};

/// Single workflow response
#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub item: WorkflowItem,
}

/// Optional transition body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    #[serde(default)]
    pub actor_id: Option<String>,
}

/// List workflows, newest first
pub async fn list_workflows(State(state): State<AppState>) -> Json<ItemsResponse<WorkflowItem>> {
    Json(ItemsResponse {
        items: state.pipeline.workflows().list(),
    })
}

/// Create a workflow from an operator draft
pub async fn create_workflow(
    State(state): State<AppState>,
    payload: Result<Json<WorkflowDraft>, JsonRejection>,
) -> ApiResult<Json<WorkflowResponse>> {
    let Json(draft) = payload?;
    if draft.target.service.trim().is_empty() {
        return Err(ApiError::Validation("target.service must not be empty".into()));
    }

    let item = state.pipeline.workflows().create(draft);
    Ok(Json(WorkflowResponse { item }))
}

/// Get a workflow by id
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkflowResponse>> {
    let item = state
        .pipeline
        .workflows()
        .get(&WorkflowId::new(id.as_str()))
        .ok_or_else(|| ApiError::NotFound(format!("Workflow {}", id)))?;

    Ok(Json(WorkflowResponse { item }))
}

/// Apply `simulate`, `approve`, `execute` or `undo`
pub async fn transition_workflow(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<WorkflowResponse>> {
    let transition: WorkflowTransition = action
        .parse()
        .map_err(|e: opsintel_types::TypeError| ApiError::NotFound(e.to_string()))?;

    let request: TransitionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TransitionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::InvalidPayload(e.to_string()))?
    };
    let actor = request
        .actor_id
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| SYSTEM_ACTOR.to_string());

    let item = state
        .pipeline
        .workflows()
        .transition(&WorkflowId::new(id), transition, &actor)?;

    Ok(Json(WorkflowResponse { item }))
}
