//! Rolling z-score anomaly detection
//!
//! Each series (service, domain, region, metric) keeps a fixed-size window of
//! recent samples. A new sample is scored against the window *before* it is
//! inserted, so detection always evaluates against history.
//!
//! A window with no spread yields z = 0. New series therefore stay silent
//! until their samples vary (cold-start suppression).

use crate::config::DetectorConfig;
use chrono::Utc;
use opsintel_types::{AlertLevel, AnomalyAlert, Correlation, Domain, MetricEvent};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use tracing::{debug, info};

/// Fixed-capacity sliding window of samples
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once over capacity
    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation
    pub fn stddev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64;
        variance.sqrt()
    }

    /// Standard deviations between `value` and the window mean; 0 without spread
    pub fn zscore(&self, value: f64) -> f64 {
        let mean = self.mean();
        let stddev = self.stddev();
        // rounding noise on a constant window is not spread
        if stddev <= f64::EPSILON * mean.abs().max(1.0) {
            return 0.0;
        }
        (value - mean) / stddev
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// Identity of one independent rolling statistic
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub service: String,
    pub domain: Domain,
    pub region: String,
    pub metric: String,
}

impl SeriesKey {
    pub fn for_event(event: &MetricEvent) -> Self {
        Self {
            service: event.service.clone(),
            domain: event.domain,
            region: event.region_name().to_string(),
            metric: event.metric_name().to_string(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}::{}",
            self.service, self.domain, self.region, self.metric
        )
    }
}

struct SeriesEntry {
    window: RollingWindow,
    last_tick: u64,
}

/// Series table with least-recently-observed eviction
#[derive(Default)]
struct SeriesTable {
    entries: HashMap<SeriesKey, SeriesEntry>,
    recency: BTreeMap<u64, SeriesKey>,
    tick: u64,
    evicted: u64,
}

impl SeriesTable {
    fn observe(
        &mut self,
        key: SeriesKey,
        window_size: usize,
        max_series: usize,
    ) -> &mut SeriesEntry {
        self.tick += 1;
        let tick = self.tick;

        match self.entries.get(&key).map(|entry| entry.last_tick) {
            Some(previous) => {
                self.recency.remove(&previous);
            }
            None => {
                while self.entries.len() >= max_series.max(1) {
                    let Some((_, oldest)) = self.recency.pop_first() else {
                        break;
                    };
                    debug!(series = %oldest, "Evicting least recently observed series");
                    self.entries.remove(&oldest);
                    self.evicted += 1;
                }
            }
        }

        self.recency.insert(tick, key.clone());
        let entry = self.entries.entry(key).or_insert_with(|| SeriesEntry {
            window: RollingWindow::new(window_size),
            last_tick: tick,
        });
        entry.last_tick = tick;
        entry
    }
}

/// Detector statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorStats {
    pub tracked_series: usize,
    pub evicted_series: u64,
}

/// Classifies numeric samples as normal, warn or critical
pub struct AnomalyDetector {
    config: DetectorConfig,
    series: Mutex<SeriesTable>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            series: Mutex::new(SeriesTable::default()),
        }
    }

    /// Score a sample and fold it into its series
    ///
    /// Events without a finite `value` are ignored and leave no state behind.
    pub fn handle(&self, event: &MetricEvent) -> Option<AnomalyAlert> {
        let value = event.value.filter(|v| v.is_finite())?;
        let key = SeriesKey::for_event(event);

        let z = {
            let mut table = self.series.lock();
            let entry = table.observe(key, self.config.window_size, self.config.max_series);
            let z = entry.window.zscore(value);
            entry.window.push(value);
            z
        };

        let level = self.classify(z)?;
        let metric = event.metric_name().to_string();
        let alert = AnomalyAlert {
            level,
            reason: format!("z-score {:.2} on {}", z, metric),
            service: event.service.clone(),
            domain: event.domain,
            region: event.region.clone(),
            value: Some(value),
            metric: Some(metric),
            correlation: Correlation { z },
            timestamp: Utc::now(),
        };

        match level {
            AlertLevel::Critical => info!(
                service = %alert.service,
                metric = alert.metric.as_deref().unwrap_or_default(),
                z,
                value,
                "Critical anomaly detected"
            ),
            AlertLevel::Warn => debug!(service = %alert.service, z, value, "Anomaly warning"),
        }

        Some(alert)
    }

    fn classify(&self, z: f64) -> Option<AlertLevel> {
        let magnitude = z.abs();
        if magnitude >= self.config.critical_z {
            Some(AlertLevel::Critical)
        } else if magnitude >= self.config.warn_z {
            Some(AlertLevel::Warn)
        } else {
            None
        }
    }

    /// Mean of the current windows of every `service` series named `metric`
    pub fn series_mean(&self, service: &str, metric: &str) -> Option<f64> {
        let table = self.series.lock();
        let means: Vec<f64> = table
            .entries
            .iter()
            .filter(|(key, entry)| {
                key.service == service && key.metric == metric && !entry.window.is_empty()
            })
            .map(|(_, entry)| entry.window.mean())
            .collect();

        if means.is_empty() {
            None
        } else {
            Some(means.iter().sum::<f64>() / means.len() as f64)
        }
    }

    /// Samples currently held for a series, oldest first
    pub fn window(&self, key: &SeriesKey) -> Option<Vec<f64>> {
        self.series
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.window.values().collect())
    }

    pub fn stats(&self) -> DetectorStats {
        let table = self.series.lock();
        DetectorStats {
            tracked_series: table.entries.len(),
            evicted_series: table.evicted,
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
