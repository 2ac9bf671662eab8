//! Metrics emission capability.
//!
//! The pipeline publishes exactly one gauge: the balance-consistency score
//! in percent. Emission goes through a [`MetricsSink`] so deployments can
//! forward to their telemetry backend; the default sink writes a structured
//! log event.

use chrono::{DateTime, Utc};

/// Name of the result-quality gauge.
pub const RESULT_SCORE_METRIC: &str = "ResultScorev2";
/// Dimension identifying the emitting pipeline.
pub const PIPELINE_DIMENSION: (&str, &str) = ("Pipeline", "GenericV4");

/// Unit of a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Percent,
    Count,
    None,
}

impl MetricUnit {
    /// The unit's wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricUnit::Percent => "Percent",
            MetricUnit::Count => "Count",
            MetricUnit::None => "None",
        }
    }
}

/// Destination for emitted metrics.
pub trait MetricsSink {
    /// Publish a single gauge observation.
    fn put_metric(
        &self,
        name: &str,
        value: f64,
        unit: MetricUnit,
        dimensions: &[(&str, &str)],
        timestamp: DateTime<Utc>,
    );
}

/// Sink that emits metrics as structured log events.
#[derive(Debug, Default, Clone)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn put_metric(
        &self,
        name: &str,
        value: f64,
        unit: MetricUnit,
        dimensions: &[(&str, &str)],
        timestamp: DateTime<Utc>,
    ) {
        tracing::info!(
            target: "ledgerline::metrics",
            metric = name,
            value,
            unit = unit.as_str(),
            dimensions = ?dimensions,
            timestamp = %timestamp,
            "metric emitted"
        );
    }
}
