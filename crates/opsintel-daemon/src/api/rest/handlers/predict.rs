//! Prediction trigger handler

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{body::Bytes, extract::State, Json};
use opsintel_pipeline::PredictRequest;
use opsintel_types::Prediction;
use serde::Serialize;
use serde_json::Value;

/// Prediction trigger response
#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub ok: bool,
    pub predictions: Vec<Prediction>,
}

/// Score services and publish the predictions
///
/// A body that is empty, `null` or not JSON at all scores the default services
/// from observed signals. JSON of the wrong shape is rejected.
pub async fn run_predict(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<PredictResponse>> {
    let request = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Null) => PredictRequest::default(),
        Ok(value) => {
            serde_json::from_value(value).map_err(|e| ApiError::InvalidPayload(e.to_string()))?
        }
        Err(e) => {
            if !body.iter().all(u8::is_ascii_whitespace) {
                tracing::debug!(error = %e, "Predict body is not JSON, using defaults");
            }
            PredictRequest::default()
        }
    };

    let predictions = state.pipeline.predict(&request);
    tracing::debug!(count = predictions.len(), "Predictions published");

    Ok(Json(PredictResponse {
        ok: true,
        predictions,
    }))
}
