//! Application state for API handlers

use crate::config::StreamConfig;
use opsintel_pipeline::Pipeline;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The pipeline every handler operates on
    pub pipeline: Arc<Pipeline>,

    /// Live stream settings
    pub stream: StreamConfig,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Graceful shutdown signal; open streams end when it flips to `true`
    pub shutdown_tx: watch::Sender<bool>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        pipeline: Arc<Pipeline>,
        stream: StreamConfig,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            pipeline,
            stream,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
            shutdown_tx,
        }
    }

    /// Flip the shutdown flag, even when nothing is listening yet
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
