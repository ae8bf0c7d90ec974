//! Metric declarations for the protocol engine.
//!
//! Metrics are declared as const [`Metric`] values so names and descriptions
//! live in one place. Recording goes through the `metrics` facade and is a
//! no-op until the application installs a recorder.
//!
//! ```rust,ignore
//! use scanlink_engine::metrics::{describe_metrics, metric_defs};
//!
//! describe_metrics();
//! metrics::counter!(metric_defs::FRAMES_RECEIVED.name).increment(1);
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "scanlink.frames.received").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Counter,
            description: "",
            unit: None,
        }
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Gauge,
            description: "",
            unit: None,
        }
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self {
            name,
            kind: MetricKind::Histogram,
            description: "",
            unit: None,
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Registers this metric's description with the metrics recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the engine.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Frames extracted from the receive stream.
    pub const FRAMES_RECEIVED: Metric = Metric::counter("scanlink.frames.received")
        .with_description("Frames extracted from the receive stream")
        .with_unit(Unit::Count);

    /// Frames that arrived with nobody waiting for them.
    pub const FRAMES_DROPPED: Metric = Metric::counter("scanlink.frames.dropped")
        .with_description("Frames dropped because no operation was waiting")
        .with_unit(Unit::Count);

    /// Bytes written to the transport.
    pub const BYTES_WRITTEN: Metric = Metric::counter("scanlink.transport.bytes_written")
        .with_description("Bytes written to the transport")
        .with_unit(Unit::Bytes);

    /// Trigger scans that returned a barcode.
    pub const SCANS_COMPLETED: Metric = Metric::counter("scanlink.scans.completed")
        .with_description("Trigger scans that returned a barcode")
        .with_unit(Unit::Count);

    /// Trigger scans abandoned by cancellation, timeout or shutdown.
    pub const SCANS_CANCELLED: Metric = Metric::counter("scanlink.scans.cancelled")
        .with_description("Trigger scans abandoned before a decode")
        .with_unit(Unit::Count);

    /// Latency from activation to decode.
    pub const SCAN_LATENCY: Metric = Metric::histogram("scanlink.scans.latency")
        .with_description("Time from activation to decoded barcode")
        .with_unit(Unit::Seconds);

    /// Acknowledged mode changes.
    pub const MODE_CHANGES: Metric = Metric::counter("scanlink.mode.changes")
        .with_description("Acknowledged mode changes")
        .with_unit(Unit::Count);

    /// Barcodes delivered to continuous-mode observers.
    pub const GOOD_READS: Metric = Metric::counter("scanlink.continuous.good_reads")
        .with_description("Barcodes delivered to continuous-mode observers")
        .with_unit(Unit::Count);

    /// Observer callbacks that panicked.
    pub const OBSERVER_PANICS: Metric = Metric::counter("scanlink.continuous.observer_panics")
        .with_description("Observer callbacks that panicked during delivery")
        .with_unit(Unit::Count);

    /// Continuous-mode observers currently registered.
    pub const OBSERVERS: Metric = Metric::gauge("scanlink.continuous.observers")
        .with_description("Continuous-mode observers currently registered")
        .with_unit(Unit::Count);

    /// Every engine metric.
    pub const ALL: &[Metric] = &[
        FRAMES_RECEIVED,
        FRAMES_DROPPED,
        BYTES_WRITTEN,
        SCANS_COMPLETED,
        SCANS_CANCELLED,
        SCAN_LATENCY,
        MODE_CHANGES,
        GOOD_READS,
        OBSERVER_PANICS,
        OBSERVERS,
    ];
}

/// Register descriptions for every engine metric. Call once at startup,
/// after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_are_unique() {
        let names: HashSet<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert!(names.iter().all(|n| n.starts_with("scanlink.")));
    }

    #[test]
    fn test_describe_without_recorder_is_noop() {
        describe_metrics();
        assert_eq!(metric_defs::SCAN_LATENCY.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::OBSERVERS.kind, MetricKind::Gauge);
    }
}
