//! # OpsIntel Pipeline
//!
//! In-memory operations intelligence pipeline: telemetry goes in, anomaly
//! alerts, outage predictions, remediation workflows and an audit trail of
//! decisions come out, all broadcast on one ordered event bus.
//!
//! ## Key Components
//!
//! - [`OpsBus`]: ordered pub/sub hub with bounded replay history
//! - [`AnomalyDetector`]: rolling z-score classifier per series
//! - [`OutagePredictor`]: bounded risk score from latency, errors and criticals
//! - [`WorkflowEngine`]: simulate/approve/execute/undo state machine
//! - [`DecisionStore`]: bounded, hash-linked decision ledger
//! - [`ReplayStream`]: backlog replay followed by live tail
//! - [`Pipeline`]: composition root wiring all of the above
//!
//! ## Example
//!
//! ```rust
//! use opsintel_pipeline::{IngestRequest, Pipeline, PipelineConfig};
//!
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let published = pipeline.ingest(IngestRequest {
//!     service: "pay".into(),
//!     metric: Some("latency_ms".into()),
//!     value: Some(120.0),
//!     ..IngestRequest::default()
//! });
//! assert_eq!(published.seq, 1);
//! ```

#![deny(unsafe_code)]

pub mod bus;
pub mod config;
pub mod decisions;
pub mod detector;
pub mod error;
pub mod pipeline;
pub mod predictor;
pub mod stream;
pub mod workflow;

pub use bus::{BusHook, BusStats, OpsBus, SubscriberId, Subscription, SubscriptionHandle};
pub use config::{BusConfig, DecisionConfig, DetectorConfig, PipelineConfig, WorkflowConfig};
pub use decisions::{ChainVerification, DecisionStore};
pub use detector::{AnomalyDetector, DetectorStats, RollingWindow, SeriesKey};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    IngestRequest, Pipeline, PredictRequest, SignalHints, DEFAULT_PREDICTION_SERVICES,
    UNKNOWN_SERVICE,
};
pub use predictor::{OutagePredictor, RiskSignals};
pub use stream::ReplayStream;
pub use workflow::{suggest_from_anomaly, WorkflowEngine, WorkflowStats};
