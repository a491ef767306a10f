//! Configuration for the system metrics collector.

use std::sync::Arc;
use std::time::Duration;

use crate::error::SourceError;
use crate::probe::ProcessHandle;
use crate::protocol::{LabelSet, MetricDescriptor};
use crate::registry::{ObservationCallback, Observer};

/// Default collection interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`SystemMetrics`](crate::SystemMetrics).
#[derive(Clone)]
pub struct CollectorConfig {
    /// How often to collect and export metrics.
    ///
    /// Default: 30 seconds
    pub interval: Duration,

    /// Static labels attached to every observation.
    ///
    /// Default: empty
    pub labels: LabelSet,

    /// The process whose runtime metrics are collected.
    ///
    /// Default: the current process
    pub process: ProcessHandle,

    /// Enable process metrics collection (`runtime.rust.mem.rss`).
    ///
    /// Default: true (when the `process` feature is enabled)
    pub collect_process: bool,

    /// Enable allocator metrics collection (`runtime.rust.heap.*`).
    ///
    /// Only has an effect with the `jemalloc` feature.
    ///
    /// Default: true
    pub collect_heap: bool,

    /// Additional metric sources, registered after the built-in ones.
    pub custom_sources: Vec<(MetricDescriptor, ObservationCallback)>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            labels: LabelSet::new(),
            process: ProcessHandle::current(),
            collect_process: true,
            collect_heap: true,
            custom_sources: Vec::new(),
        }
    }
}

impl CollectorConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collection interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Replaces the static labels.
    #[must_use]
    pub fn with_labels(mut self, labels: LabelSet) -> Self {
        self.labels = labels;
        self
    }

    /// Adds a single static label.
    #[must_use]
    pub fn add_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key, value);
        self
    }

    /// Sets the process whose runtime metrics are collected.
    #[must_use]
    pub fn with_process(mut self, process: ProcessHandle) -> Self {
        self.process = process;
        self
    }

    /// Enables or disables process metrics.
    #[must_use]
    pub fn with_process_metrics(mut self, enabled: bool) -> Self {
        self.collect_process = enabled;
        self
    }

    /// Enables or disables allocator metrics.
    #[must_use]
    pub fn with_heap_metrics(mut self, enabled: bool) -> Self {
        self.collect_heap = enabled;
        self
    }

    /// Adds a custom metric source.
    #[must_use]
    pub fn add_source<F>(mut self, descriptor: MetricDescriptor, callback: F) -> Self
    where
        F: Fn(&mut dyn Observer) -> Result<(), SourceError> + Send + Sync + 'static,
    {
        let callback: ObservationCallback = Arc::new(callback);
        self.custom_sources.push((descriptor, callback));
        self
    }
}

impl std::fmt::Debug for CollectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorConfig")
            .field("interval", &self.interval)
            .field("labels", &self.labels)
            .field("process", &self.process)
            .field("collect_process", &self.collect_process)
            .field("collect_heap", &self.collect_heap)
            .field("custom_sources_count", &self.custom_sources.len())
            .finish()
    }
}
