//! Outage risk scoring
//!
//! A pure function of three signals. Publishing the result is the caller's job.

use chrono::Utc;
use opsintel_types::{Prediction, PredictionModel, RiskExplain};
use serde::{Deserialize, Serialize};

/// Forecast horizon of every prediction
pub const HORIZON_HOURS: u32 = 24;

/// Latency considered healthy; the latency score starts above it
pub const BASELINE_LATENCY_MS: f64 = 120.0;

const LATENCY_SPAN_MS: f64 = 600.0;
const ERROR_RATE_CEILING_PCT: f64 = 20.0;
const CRITICALS_CEILING: f64 = 5.0;

const LATENCY_WEIGHT: f64 = 0.50;
const ERROR_WEIGHT: f64 = 0.35;
const CRITICALS_WEIGHT: f64 = 0.15;

/// Inputs to one risk computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSignals {
    pub service: String,
    pub avg_latency_ms: f64,
    pub error_rate_pct: f64,
    pub recent_criticals: u32,
}

/// Stateless outage forecaster
#[derive(Debug, Clone, Copy, Default)]
pub struct OutagePredictor;

impl OutagePredictor {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, signals: &RiskSignals) -> Prediction {
        let latency = unit((signals.avg_latency_ms - BASELINE_LATENCY_MS) / LATENCY_SPAN_MS);
        let error_rate = unit(signals.error_rate_pct / ERROR_RATE_CEILING_PCT);
        let criticals = unit(f64::from(signals.recent_criticals) / CRITICALS_CEILING);

        let risk = unit(
            LATENCY_WEIGHT * latency + ERROR_WEIGHT * error_rate + CRITICALS_WEIGHT * criticals,
        );

        Prediction {
            model: PredictionModel::OutageForecaster,
            service: signals.service.clone(),
            horizon_hours: HORIZON_HOURS,
            risk: round2(risk),
            explain: RiskExplain {
                latency: round2(latency),
                error_rate: round2(error_rate),
                criticals: round2(criticals),
            },
            timestamp: Utc::now(),
        }
    }
}

/// Clamp to `[0, 1]`; NaN counts as no signal
fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
