//! Buffered metric recording, threshold alerting and operation timing.
//!
//! Metrics are appended to an in-memory buffer and flushed in batches,
//! either when the buffer reaches its size threshold or on the periodic
//! flush tick. A failed flush requeues the batch at the front of the
//! buffer instead of dropping it. Telemetry persistence is best-effort
//! throughout and never fails a caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::repositories::TelemetryRepository;
use crate::domain::telemetry::{AlertConfig, PerformanceMetric, TriggeredAlert};

pub struct MonitoringService {
    telemetry: Arc<dyn TelemetryRepository>,
    buffer: Mutex<Vec<PerformanceMetric>>,
    timers: Mutex<HashMap<String, Instant>>,
    alerts: Vec<AlertConfig>,
    flush_threshold: usize,
}

impl MonitoringService {
    pub fn new(
        telemetry: Arc<dyn TelemetryRepository>,
        alerts: Vec<AlertConfig>,
        flush_threshold: usize,
    ) -> Self {
        Self {
            telemetry,
            buffer: Mutex::new(Vec::new()),
            timers: Mutex::new(HashMap::new()),
            alerts,
            flush_threshold: flush_threshold.max(1),
        }
    }

    /// Record a metric, evaluate alert rules against it and flush the
    /// buffer once it reaches the size threshold.
    pub async fn record_metric(&self, name: &str, value: f64, tags: HashMap<String, String>) {
        let metric = PerformanceMetric::new(name, value, tags);
        self.evaluate_alerts(&metric).await;

        let should_flush = {
            let mut buffer = self.buffer.lock().await;
            buffer.push(metric);
            buffer.len() >= self.flush_threshold
        };

        if should_flush {
            self.flush().await;
        }
    }

    /// Start a timer for a named operation. Timers are keyed by name plus
    /// sorted tags, so concurrent operations with different tags do not
    /// collide.
    pub async fn record_operation_start(&self, name: &str, tags: &HashMap<String, String>) {
        let key = Self::timer_key(name, tags);
        self.timers.lock().await.insert(key, Instant::now());
    }

    /// Finish a timer and record a `{name}_time` metric in milliseconds.
    ///
    /// A missing start is tolerated: the duration is reported as zero.
    pub async fn record_operation_end(
        &self,
        name: &str,
        tags: &HashMap<String, String>,
    ) -> f64 {
        let key = Self::timer_key(name, tags);
        let duration_ms = match self.timers.lock().await.remove(&key) {
            Some(start) => start.elapsed().as_millis() as f64,
            None => {
                debug!("Operation end without start for `{}`", key);
                0.0
            }
        };

        self.record_metric(&format!("{name}_time"), duration_ms, tags.clone())
            .await;
        duration_ms
    }

    /// Flush buffered metrics to storage. On failure the batch is
    /// requeued at the front of the buffer.
    pub async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };
        if batch.is_empty() {
            return;
        }

        let count = batch.len();
        match self.telemetry.insert_metrics(&batch).await {
            Ok(()) => debug!("Flushed {} metrics", count),
            Err(e) => {
                warn!("Failed to flush {} metrics, requeueing: {}", count, e);
                let mut buffer = self.buffer.lock().await;
                let mut requeued = batch;
                requeued.append(&mut buffer);
                *buffer = requeued;
            }
        }
    }

    /// Number of metrics currently buffered (for tests and diagnostics).
    pub async fn buffered_len(&self) -> usize {
        self.buffer.lock().await.len()
    }

    /// Spawn the periodic flush task. Cancelling the token performs one
    /// final flush before the task exits.
    pub fn spawn_flush_task(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let service = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            info!("📊 Metrics flush task started ({}s interval)", interval.as_secs());
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        service.flush().await;
                        info!("📊 Metrics flush task stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        service.flush().await;
                    }
                }
            }
        })
    }

    async fn evaluate_alerts(&self, metric: &PerformanceMetric) {
        for alert in &self.alerts {
            if alert.matches(&metric.name, metric.value) {
                warn!(
                    "🚨 ALERT {}: {} = {} ({} {})",
                    alert.message,
                    metric.name,
                    metric.value,
                    alert.operator.as_str(),
                    alert.threshold
                );
                let triggered = TriggeredAlert {
                    metric_name: metric.name.clone(),
                    metric_value: metric.value,
                    threshold: alert.threshold,
                    operator: alert.operator,
                    message: alert.message.clone(),
                    triggered_at: metric.recorded_at,
                };
                if let Err(e) = self.telemetry.insert_alert(&triggered).await {
                    warn!("Failed to persist alert for {}: {}", metric.name, e);
                }
            }
        }
    }

    fn timer_key(name: &str, tags: &HashMap<String, String>) -> String {
        let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort();
        format!("{name}|{}", pairs.join(","))
    }
}
