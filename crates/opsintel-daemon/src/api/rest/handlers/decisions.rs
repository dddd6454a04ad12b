//! Decision ledger handlers

use super::ItemsResponse;
use crate::api::rest::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use opsintel_types::DecisionCard;
use serde::Deserialize;

/// List decisions query params
#[derive(Debug, Deserialize)]
pub struct ListDecisionsQuery {
    pub limit: Option<usize>,
}

/// Most recent decisions first
pub async fn list_decisions(
    State(state): State<AppState>,
    Query(query): Query<ListDecisionsQuery>,
) -> Json<ItemsResponse<DecisionCard>> {
    let decisions = state.pipeline.decisions();
    let limit = query
        .limit
        .unwrap_or_else(|| decisions.default_list_limit())
        .min(state.pipeline.config().decisions.capacity);

    Json(ItemsResponse {
        items: decisions.list(limit),
    })
}
