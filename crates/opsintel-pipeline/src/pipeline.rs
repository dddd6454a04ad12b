//! Composition root
//!
//! A [`Pipeline`] owns one bus, detector, predictor, workflow engine and
//! decision store, wired together by the anomaly hook. Independent pipelines
//! share nothing.

use crate::bus::{BusHook, OpsBus};
use crate::config::PipelineConfig;
use crate::decisions::DecisionStore;
use crate::detector::AnomalyDetector;
use crate::error::PipelineResult;
use crate::predictor::{OutagePredictor, RiskSignals, BASELINE_LATENCY_MS};
use crate::stream::ReplayStream;
use crate::workflow::WorkflowEngine;
use chrono::{DateTime, Utc};
use opsintel_types::{
    BusEvent, Domain, MetricEvent, OpsEvent, Prediction, Severity, DEFAULT_METRIC,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Services scored when a predict request names none
pub const DEFAULT_PREDICTION_SERVICES: [&str; 3] =
    ["customer.web", "vendor.portal", "admin.portal"];

/// Service recorded for ingress events that omit one
pub const UNKNOWN_SERVICE: &str = "unknown";

const ERROR_RATE_METRIC: &str = "error_rate_pct";

fn default_service() -> String {
    UNKNOWN_SERVICE.to_string()
}

/// Decode a field, falling back to its default when the value is unusable
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_else(|e| {
        debug!(error = %e, "Ignoring unusable ingress field");
        T::default()
    }))
}

fn criticals_hint<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    // float-to-int casts saturate
    Ok(raw.filter(|v| v.is_finite()).map(|v| v.round() as u32))
}

/// Ingress payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default = "default_service")]
    pub service: String,

    /// Unknown domains fall back to `infra`
    #[serde(default, deserialize_with = "lenient")]
    pub domain: Domain,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub tenant: Option<String>,

    #[serde(default)]
    pub metric: Option<String>,

    /// Non-numeric values are dropped; the event is still published
    #[serde(default, deserialize_with = "lenient")]
    pub value: Option<f64>,

    #[serde(default, deserialize_with = "lenient")]
    pub severity: Option<Severity>,

    #[serde(default)]
    pub message: Option<String>,

    /// Producer timestamp; the receive time is used when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IngestRequest {
    fn into_event(self, received_at: DateTime<Utc>) -> MetricEvent {
        let service = if self.service.trim().is_empty() {
            default_service()
        } else {
            self.service
        };
        MetricEvent {
            service,
            domain: self.domain,
            region: self.region,
            tenant: self.tenant,
            metric: self.metric,
            value: self.value,
            severity: self.severity,
            timestamp: self.timestamp.unwrap_or(received_at),
            received_at,
            message: self.message,
        }
    }
}

/// Caller-supplied predictor inputs for one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalHints {
    #[serde(default)]
    pub latency_ms: Option<f64>,

    #[serde(default)]
    pub error_rate_pct: Option<f64>,

    /// Rounded to the nearest whole count
    #[serde(default, rename = "recentCriticals", deserialize_with = "criticals_hint")]
    pub recent_criticals: Option<u32>,
}

/// Predict trigger payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub services: Option<Vec<String>>,

    #[serde(default)]
    pub metrics: HashMap<String, SignalHints>,
}

impl PredictRequest {
    pub fn for_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: Some(services.into_iter().map(Into::into).collect()),
            metrics: HashMap::new(),
        }
    }
}

/// Runs the detector on every metric sample and turns critical alerts into workflows
struct AnomalyHook {
    detector: Arc<AnomalyDetector>,
    workflows: Arc<WorkflowEngine>,
}

impl BusHook for AnomalyHook {
    fn name(&self) -> &str {
        "anomaly-detector"
    }

    fn on_event(&self, bus: &OpsBus, event: &OpsEvent) -> PipelineResult<()> {
        let OpsEvent::Metric(sample) = event else {
            return Ok(());
        };
        let Some(alert) = self.detector.handle(sample) else {
            return Ok(());
        };

        let critical = alert.is_critical();
        bus.push(OpsEvent::Anomaly(alert.clone()));
        if critical {
            self.workflows.create_from_anomaly(&alert);
        }
        Ok(())
    }
}

/// The wired-up operations intelligence pipeline
pub struct Pipeline {
    config: PipelineConfig,
    bus: OpsBus,
    detector: Arc<AnomalyDetector>,
    predictor: OutagePredictor,
    workflows: Arc<WorkflowEngine>,
    decisions: Arc<DecisionStore>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let bus = OpsBus::new(config.bus.clone());
        let detector = Arc::new(AnomalyDetector::new(config.detector.clone()));
        let decisions = Arc::new(DecisionStore::new(config.decisions.clone()));
        let workflows = Arc::new(WorkflowEngine::new(
            config.workflows.clone(),
            bus.clone(),
            decisions.clone(),
        ));

        bus.register_hook(Arc::new(AnomalyHook {
            detector: detector.clone(),
            workflows: workflows.clone(),
        }));

        info!(
            history_capacity = config.bus.history_capacity,
            window_size = config.detector.window_size,
            decision_capacity = config.decisions.capacity,
            "Pipeline initialized"
        );

        Self {
            config,
            bus,
            detector,
            predictor: OutagePredictor::new(),
            workflows,
            decisions,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn bus(&self) -> &OpsBus {
        &self.bus
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn workflows(&self) -> &WorkflowEngine {
        &self.workflows
    }

    pub fn decisions(&self) -> &DecisionStore {
        &self.decisions
    }

    /// Accept one ingress event and publish it
    pub fn ingest(&self, request: IngestRequest) -> BusEvent {
        let event = request.into_event(Utc::now());
        debug!(
            service = %event.service,
            domain = %event.domain,
            metric = event.metric.as_deref().unwrap_or_default(),
            value = ?event.value,
            "Ingesting event"
        );
        self.bus.push(OpsEvent::Metric(event))
    }

    /// Score the requested services and publish each prediction
    pub fn predict(&self, request: &PredictRequest) -> Vec<Prediction> {
        let services: Vec<String> = match &request.services {
            Some(services) => services.clone(),
            None => DEFAULT_PREDICTION_SERVICES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        services
            .into_iter()
            .map(|service| {
                let observed = self.observed_signals(&service);
                let signals = match request.metrics.get(&service) {
                    Some(hints) => RiskSignals {
                        avg_latency_ms: hints.latency_ms.unwrap_or(observed.avg_latency_ms),
                        error_rate_pct: hints.error_rate_pct.unwrap_or(observed.error_rate_pct),
                        recent_criticals: hints
                            .recent_criticals
                            .unwrap_or(observed.recent_criticals),
                        service,
                    },
                    None => observed,
                };

                let prediction = self.predictor.compute(&signals);
                debug!(
                    service = %prediction.service,
                    risk = prediction.risk,
                    "Prediction computed"
                );
                self.bus.push(OpsEvent::Prediction(prediction.clone()));
                prediction
            })
            .collect()
    }

    /// Predictor inputs derived from what the pipeline has seen for `service`
    pub fn observed_signals(&self, service: &str) -> RiskSignals {
        let recent_criticals = self
            .bus
            .recent_history()
            .iter()
            .filter(|e| {
                matches!(&e.event, OpsEvent::Anomaly(alert)
                    if alert.is_critical() && alert.service == service)
            })
            .count();

        RiskSignals {
            service: service.to_string(),
            avg_latency_ms: self
                .detector
                .series_mean(service, DEFAULT_METRIC)
                .unwrap_or(BASELINE_LATENCY_MS),
            error_rate_pct: self
                .detector
                .series_mean(service, ERROR_RATE_METRIC)
                .unwrap_or(0.0),
            recent_criticals: u32::try_from(recent_criticals).unwrap_or(u32::MAX),
        }
    }

    /// Replay buffered history, then tail live events
    pub fn open_stream(&self) -> ReplayStream {
        ReplayStream::open(&self.bus)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // the anomaly hook holds the engine, which holds the bus
        self.bus.clear_hooks();
    }
}
