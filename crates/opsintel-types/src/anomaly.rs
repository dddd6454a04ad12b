//! Anomaly alerts produced by the detector

use crate::events::Domain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warn,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertLevel::Warn => f.write_str("warn"),
            AlertLevel::Critical => f.write_str("critical"),
        }
    }
}

/// Statistical evidence attached to an alert
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub z: f64,
}

/// A sample that deviated from its series' recent history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlert {
    pub level: AlertLevel,
    pub reason: String,
    pub service: String,
    pub domain: Domain,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,

    pub correlation: Correlation,
    pub timestamp: DateTime<Utc>,
}

impl AnomalyAlert {
    pub fn is_critical(&self) -> bool {
        self.level == AlertLevel::Critical
    }
}
