//! Event types carried by the ops bus
//!
//! Every event pushed onto the bus is an [`OpsEvent`]; the bus wraps it in a
//! [`BusEvent`] envelope carrying the broadcast sequence number. The wire form
//! is flat JSON with a `type` tag, e.g.
//! `{"type":"metric","seq":7,"publishedAt":"…","service":"pay",…}`.

use crate::anomaly::AnomalyAlert;
use crate::prediction::Prediction;
use crate::workflow::{WorkflowItem, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default metric name for numeric samples that don't name one
pub const DEFAULT_METRIC: &str = "latency_ms";

/// Business domain a service belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Traffic,
    Financial,
    Security,
    Ai,
    #[default]
    Infra,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Traffic => "traffic",
            Domain::Financial => "financial",
            Domain::Security => "security",
            Domain::Ai => "ai",
            Domain::Infra => "infra",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Producer-assigned severity of a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

/// A raw telemetry sample or structured event accepted by ingress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricEvent {
    pub service: String,

    pub domain: Domain,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,

    /// Producer timestamp, or the receive time when the producer sent none
    pub timestamp: DateTime<Utc>,

    /// When ingress accepted the event
    pub received_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MetricEvent {
    /// Metric name, falling back to [`DEFAULT_METRIC`]
    pub fn metric_name(&self) -> &str {
        self.metric.as_deref().unwrap_or(DEFAULT_METRIC)
    }

    /// Region, falling back to `"global"`
    pub fn region_name(&self) -> &str {
        self.region.as_deref().unwrap_or("global")
    }
}

/// Everything that flows through the ops bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OpsEvent {
    #[serde(rename = "metric")]
    Metric(MetricEvent),

    #[serde(rename = "anomaly")]
    Anomaly(AnomalyAlert),

    #[serde(rename = "prediction")]
    Prediction(Prediction),

    #[serde(rename = "workflow.created")]
    WorkflowCreated { item: WorkflowItem },

    #[serde(rename = "workflow.simulated")]
    WorkflowSimulated { item: WorkflowItem },

    #[serde(rename = "workflow.approved")]
    WorkflowApproved { item: WorkflowItem },

    #[serde(rename = "workflow.executed")]
    WorkflowExecuted { item: WorkflowItem },

    #[serde(rename = "workflow.undone")]
    WorkflowUndone { item: WorkflowItem },
}

impl OpsEvent {
    /// Event announcing that a workflow reached `status`
    pub fn workflow(status: WorkflowStatus, item: WorkflowItem) -> Self {
        match status {
            WorkflowStatus::Pending => OpsEvent::WorkflowCreated { item },
            WorkflowStatus::Simulated => OpsEvent::WorkflowSimulated { item },
            WorkflowStatus::Approved => OpsEvent::WorkflowApproved { item },
            WorkflowStatus::Executed => OpsEvent::WorkflowExecuted { item },
            WorkflowStatus::Undone => OpsEvent::WorkflowUndone { item },
        }
    }

    /// The `type` tag used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            OpsEvent::Metric(_) => "metric",
            OpsEvent::Anomaly(_) => "anomaly",
            OpsEvent::Prediction(_) => "prediction",
            OpsEvent::WorkflowCreated { .. } => "workflow.created",
            OpsEvent::WorkflowSimulated { .. } => "workflow.simulated",
            OpsEvent::WorkflowApproved { .. } => "workflow.approved",
            OpsEvent::WorkflowExecuted { .. } => "workflow.executed",
            OpsEvent::WorkflowUndone { .. } => "workflow.undone",
        }
    }

    /// Service the event concerns, if any
    pub fn service(&self) -> Option<&str> {
        match self {
            OpsEvent::Metric(m) => Some(&m.service),
            OpsEvent::Anomaly(a) => Some(&a.service),
            OpsEvent::Prediction(p) => Some(&p.service),
            OpsEvent::WorkflowCreated { item }
            | OpsEvent::WorkflowSimulated { item }
            | OpsEvent::WorkflowApproved { item }
            | OpsEvent::WorkflowExecuted { item }
            | OpsEvent::WorkflowUndone { item } => Some(&item.target.service),
        }
    }
}

/// Envelope assigned by the bus when an event is pushed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    /// Position in the bus's total broadcast order, starting at 1
    pub seq: u64,

    pub published_at: DateTime<Utc>,

    #[serde(flatten)]
    pub event: OpsEvent,
}
