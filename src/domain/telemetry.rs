//! Telemetry value types: performance metrics and alert configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single recorded measurement, buffered in memory and flushed in
/// batches by the monitoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetric {
    pub name: String,
    pub value: f64,
    pub tags: HashMap<String, String>,
    pub recorded_at: DateTime<Utc>,
}

impl PerformanceMetric {
    pub fn new(name: &str, value: f64, tags: HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            value,
            tags,
            recorded_at: Utc::now(),
        }
    }
}

/// Comparison applied between a metric value and an alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOperator {
    Gt,
    Lt,
    Eq,
}

impl AlertOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Eq => "eq",
        }
    }
}

/// Static alert rule evaluated against every recorded metric of the same
/// name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub metric_name: String,
    pub threshold: f64,
    pub operator: AlertOperator,
    pub message: String,
}

impl AlertConfig {
    /// Whether `value` trips this alert.
    pub fn matches(&self, metric_name: &str, value: f64) -> bool {
        if self.metric_name != metric_name {
            return false;
        }
        match self.operator {
            AlertOperator::Gt => value > self.threshold,
            AlertOperator::Lt => value < self.threshold,
            AlertOperator::Eq => value == self.threshold,
        }
    }
}

/// A fired alert, logged and persisted for the operational surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub metric_name: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub operator: AlertOperator,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(op: AlertOperator, threshold: f64) -> AlertConfig {
        AlertConfig {
            metric_name: "scrape_time".to_string(),
            threshold,
            operator: op,
            message: "scrape took too long".to_string(),
        }
    }

    #[test]
    fn operators_compare_as_expected() {
        assert!(alert(AlertOperator::Gt, 10.0).matches("scrape_time", 11.0));
        assert!(!alert(AlertOperator::Gt, 10.0).matches("scrape_time", 10.0));
        assert!(alert(AlertOperator::Lt, 0.5).matches("scrape_time", 0.4));
        assert!(alert(AlertOperator::Eq, 3.0).matches("scrape_time", 3.0));
    }

    #[test]
    fn alert_only_matches_its_metric() {
        assert!(!alert(AlertOperator::Gt, 1.0).matches("other_metric", 100.0));
    }
}
