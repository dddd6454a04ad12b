//! Pipeline configuration
//!
//! Every section deserializes with defaults so a daemon config file only needs
//! to name the values it changes.

use serde::{Deserialize, Serialize};

/// Main pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub decisions: DecisionConfig,

    #[serde(default)]
    pub workflows: WorkflowConfig,
}

/// Ops bus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    /// Recent-history ring buffer capacity
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Per-subscriber outbound queue; a subscriber that falls this far behind is dropped
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            subscriber_queue_capacity: default_subscriber_queue(),
        }
    }
}

/// Anomaly detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Samples kept per series
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// |z| at or above which a sample is a warning
    #[serde(default = "default_warn_z")]
    pub warn_z: f64,

    /// |z| at or above which a sample is critical
    #[serde(default = "default_critical_z")]
    pub critical_z: f64,

    /// Tracked series cap; the least recently observed series is evicted beyond it
    #[serde(default = "default_max_series")]
    pub max_series: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            warn_z: default_warn_z(),
            critical_z: default_critical_z(),
            max_series: default_max_series(),
        }
    }
}

/// Decision store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Ring buffer capacity
    #[serde(default = "default_decision_capacity")]
    pub capacity: usize,

    /// Entries returned by `list` when the caller gives no limit
    #[serde(default = "default_list_limit")]
    pub default_list_limit: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            capacity: default_decision_capacity(),
            default_list_limit: default_list_limit(),
        }
    }
}

/// Workflow engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Soft cap on tracked workflows; settled workflows are evicted oldest-first beyond it
    #[serde(default = "default_max_workflows")]
    pub max_items: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_workflows(),
        }
    }
}

// Default value helpers
fn default_history_capacity() -> usize {
    200
}

fn default_subscriber_queue() -> usize {
    1024
}

fn default_window_size() -> usize {
    24
}

fn default_warn_z() -> f64 {
    2.5
}

fn default_critical_z() -> f64 {
    3.5
}

fn default_max_series() -> usize {
    10_000
}

fn default_decision_capacity() -> usize {
    200
}

fn default_list_limit() -> usize {
    50
}

fn default_max_workflows() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.bus.history_capacity, 200);
        assert_eq!(config.detector.window_size, 24);
        assert_eq!(config.detector.warn_z, 2.5);
        assert_eq!(config.detector.critical_z, 3.5);
        assert_eq!(config.decisions.capacity, 200);
        assert_eq!(config.decisions.default_list_limit, 50);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"detector": {"max_series": 16}}"#).unwrap();
        assert_eq!(config.detector.max_series, 16);
        assert_eq!(config.detector.window_size, 24);
        assert_eq!(config.bus, BusConfig::default());
    }
}
