//! Outage risk predictions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the only forecasting model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PredictionModel {
    #[default]
    #[serde(rename = "outage_forecaster")]
    OutageForecaster,
}

/// Per-signal contribution scores, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskExplain {
    pub latency: f64,
    pub error_rate: f64,
    pub criticals: f64,
}

/// Risk that `service` suffers an outage within the horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub model: PredictionModel,
    pub service: String,
    pub horizon_hours: u32,
    /// Bounded to `[0, 1]`, rounded to two decimals
    pub risk: f64,
    pub explain: RiskExplain,
    pub timestamp: DateTime<Utc>,
}
