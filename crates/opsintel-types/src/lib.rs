//! OpsIntel Types - Core types for the operations intelligence pipeline
//!
//! The pipeline ingests telemetry from distributed services, detects
//! statistical anomalies, proposes remediation workflows and records every
//! automated suggestion and human transition as an auditable decision.
//!
//! ## Key Concepts
//!
//! - **MetricEvent**: A raw sample or structured event accepted by ingress
//! - **OpsEvent / BusEvent**: Everything broadcast on the ops bus, and its envelope
//! - **AnomalyAlert**: A sample whose z-score crossed a threshold
//! - **Prediction**: Bounded outage-risk score for a service
//! - **WorkflowItem**: A remediation action driven through simulate/approve/execute/undo
//! - **DecisionCard**: One hash-linked audit entry

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod anomaly;
pub mod decision;
pub mod events;
pub mod ids;
pub mod prediction;
pub mod workflow;

pub use anomaly::{AlertLevel, AnomalyAlert, Correlation};
pub use decision::{DecisionAction, DecisionCard, DecisionResource, NewDecision, SYSTEM_ACTOR};
pub use events::{BusEvent, Domain, MetricEvent, OpsEvent, Severity, DEFAULT_METRIC};
pub use ids::{DecisionId, WorkflowId};
pub use prediction::{Prediction, PredictionModel, RiskExplain};
pub use workflow::{
    Parameters, WorkflowDraft, WorkflowItem, WorkflowKind, WorkflowStatus, WorkflowTarget,
    WorkflowTransition,
};

/// Errors raised while interpreting pipeline vocabulary
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("Unknown workflow transition: {0}")]
    UnknownTransition(String),
}
