//! OpsIntel Daemon library
//!
//! This module provides the core components for the OpsIntel daemon:
//! - REST API and SSE stream handlers
//! - Layered configuration
//! - Prediction scheduler
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use scheduler::Scheduler;
pub use server::Server;
