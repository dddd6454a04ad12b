//! Configuration for opsintel-daemon

use opsintel_pipeline::{PipelineConfig, DEFAULT_PREDICTION_SERVICES};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Bus, detector, decision store and workflow engine
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Periodic prediction
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Live event stream
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
            request_timeout_secs: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the outage predictor periodically
    #[serde(default = "default_true")]
    pub prediction_enabled: bool,

    /// Prediction interval in seconds
    #[serde(default = "default_prediction_interval")]
    pub prediction_interval_secs: u64,

    /// Services scored on every tick
    #[serde(default = "default_services")]
    pub services: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            prediction_enabled: true,
            prediction_interval_secs: default_prediction_interval(),
            services: default_services(),
        }
    }
}

/// Stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Seconds between keep-alive comments on idle streams
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_size() -> usize {
    1024 * 1024
}

fn default_prediction_interval() -> u64 {
    60
}

fn default_services() -> Vec<String> {
    DEFAULT_PREDICTION_SERVICES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_keep_alive() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then `OPSINTEL_*` env vars
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // OPSINTEL_SERVER__LISTEN_ADDR, OPSINTEL_PIPELINE__DETECTOR__WARN_Z, ...
        builder = builder.add_source(
            config::Environment::with_prefix("OPSINTEL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.server.listen_addr.port(), 8080);
        assert!(config.server.listen_addr.ip().is_loopback());
        assert_eq!(config.server.max_body_size, 1024 * 1024);
        assert_eq!(config.pipeline.bus.history_capacity, 200);
        assert_eq!(config.stream.keep_alive_secs, 15);
    }

    #[test]
    fn test_scheduler_defaults() {
        let config = SchedulerConfig::default();
        assert!(config.prediction_enabled);
        assert_eq!(config.prediction_interval_secs, 60);
        assert_eq!(
            config.services,
            vec!["customer.web", "vendor.portal", "admin.portal"]
        );
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DaemonConfig::load(None).unwrap();
        assert_eq!(config.pipeline.detector.window_size, 24);
        assert_eq!(config.pipeline.decisions.capacity, 200);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: DaemonConfig = serde_json::from_str(
            r#"{
                "pipeline": {"detector": {"critical_z": 4.0}},
                "scheduler": {"prediction_enabled": false}
            }"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.detector.critical_z, 4.0);
        assert_eq!(config.pipeline.detector.warn_z, 2.5);
        assert!(!config.scheduler.prediction_enabled);
        assert_eq!(config.scheduler.services.len(), 3);
    }
}
