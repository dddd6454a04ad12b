//! Periodic prediction loop

use crate::config::SchedulerConfig;
use opsintel_pipeline::{Pipeline, PredictRequest};
use opsintel_types::Prediction;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Scheduler state
pub struct Scheduler {
    config: SchedulerConfig,
    pipeline: Arc<Pipeline>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, pipeline: Arc<Pipeline>) -> Arc<Self> {
        Arc::new(Self { config, pipeline })
    }

    /// Run until `shutdown` flips to `true`
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.prediction_enabled {
            tracing::info!("Prediction scheduler disabled");
            return;
        }

        let period = Duration::from_secs(self.config.prediction_interval_secs.max(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; start scoring one period in
        ticker.tick().await;

        tracing::info!(
            interval_secs = period.as_secs(),
            services = self.config.services.len(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Score every configured service once
    pub fn run_once(&self) -> Vec<Prediction> {
        let predictions = self
            .pipeline
            .predict(&PredictRequest::for_services(self.config.services.iter().cloned()));

        for prediction in &predictions {
            tracing::debug!(
                service = %prediction.service,
                risk = prediction.risk,
                "Scheduled prediction"
            );
        }
        predictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsintel_pipeline::PipelineConfig;

    fn scheduler(config: SchedulerConfig) -> (Arc<Scheduler>, Arc<Pipeline>) {
        let pipeline = Arc::new(Pipeline::new(PipelineConfig::default()));
        (Scheduler::new(config, pipeline.clone()), pipeline)
    }

    #[test]
    fn test_run_once_publishes_configured_services() {
        let (scheduler, pipeline) = scheduler(SchedulerConfig {
            services: vec!["pay".into(), "search".into()],
            ..SchedulerConfig::default()
        });

        let predictions = scheduler.run_once();
        assert_eq!(predictions.len(), 2);
        assert_eq!(pipeline.bus().stats().last_seq, 2);
    }

    #[tokio::test]
    async fn test_ticks_until_shutdown() {
        let (scheduler, pipeline) = scheduler(SchedulerConfig {
            prediction_interval_secs: 1,
            ..SchedulerConfig::default()
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(scheduler.start(shutdown_rx));

        tokio::time::timeout(Duration::from_secs(5), async {
            while pipeline.bus().stats().last_seq < 3 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_disabled_scheduler_returns_immediately() {
        let (scheduler, pipeline) = scheduler(SchedulerConfig {
            prediction_enabled: false,
            ..SchedulerConfig::default()
        });
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio_test::block_on(scheduler.start(shutdown_rx));
        assert_eq!(pipeline.bus().stats().last_seq, 0);
    }
}
