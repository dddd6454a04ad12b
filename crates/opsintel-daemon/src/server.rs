//! Server setup and lifecycle management

use crate::api::{create_router, AppState};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::scheduler::Scheduler;
use opsintel_pipeline::Pipeline;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// OpsIntel Daemon Server
pub struct Server {
    config: DaemonConfig,
    pipeline: Arc<Pipeline>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        if config.pipeline.detector.warn_z > config.pipeline.detector.critical_z {
            return Err(DaemonError::Config(format!(
                "detector.warn_z ({}) must not exceed detector.critical_z ({})",
                config.pipeline.detector.warn_z, config.pipeline.detector.critical_z
            )));
        }

        let pipeline = Arc::new(Pipeline::new(config.pipeline.clone()));
        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> Arc<Pipeline> {
        self.pipeline.clone()
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Create app state
        let state = AppState::new(self.pipeline.clone(), self.config.stream.clone(), shutdown_tx);

        // Create router
        let app = create_router(state.clone(), &self.config.server);

        // Create listener
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("OpsIntel daemon listening on {}", addr);

        // Start scheduler in background
        let scheduler = Scheduler::new(self.config.scheduler.clone(), self.pipeline.clone());
        let scheduler_handle = tokio::spawn(scheduler.start(shutdown_rx));

        // Run server with graceful shutdown; open streams end once the signal flips
        let signal_state = state.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                signal_state.request_shutdown();
            })
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("OpsIntel daemon shutting down");

        // Stop scheduler
        state.request_shutdown();
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
