//! Error types for the pipeline

use opsintel_types::WorkflowId;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A workflow transition referenced an id the engine doesn't track
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    /// A bus hook failed while observing an event
    #[error("Hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    /// A callback subscriber's worker thread could not be started
    #[error("Failed to start subscriber worker: {0}")]
    SubscriberWorker(String),
}

impl PipelineError {
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
