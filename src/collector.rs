//! The system metrics collector.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CollectorConfig;
use crate::error::Error;
use crate::exporter::Exporter;
use crate::probe::{OsProbe, ProcessHandle, SystemProbe};
use crate::protocol::LabelSet;
use crate::registry::ObserverRegistry;
use crate::scheduler::{PushScheduler, SchedulerState, TickSummary};
use crate::sources::{self, SourceContext};

/// Periodically samples host and process counters and pushes them to an
/// [`Exporter`].
///
/// The metric catalogue is registered once at construction, in this order:
///
/// | name | unit | kind |
/// |------|------|------|
/// | `mem.available`, `mem.total` | bytes | int |
/// | `cpu.user`, `cpu.nice`, `cpu.sys`, `cpu.idle`, `cpu.usage`, `cpu.total` | seconds | float |
/// | `net.bytes_sent`, `net.bytes_recv` | bytes | int |
/// | `runtime.rust.mem.rss` | bytes | int |
/// | `runtime.rust.heap.allocated`, `.active`, `.resident` (`jemalloc` only) | bytes | int |
///
/// followed by the custom sources of the [`CollectorConfig`]. Every
/// observation carries the configured static labels.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use system_metrics::{CollectorConfig, LogExporter, SystemMetrics};
///
/// let metrics = SystemMetrics::new(
///     Arc::new(LogExporter),
///     CollectorConfig::new()
///         .with_interval(Duration::from_secs(10))
///         .add_label("host", "web-1"),
/// )
/// .unwrap();
/// metrics.start().unwrap();
/// // ...
/// metrics.stop().unwrap();
/// ```
#[derive(Debug)]
pub struct SystemMetrics {
    scheduler: PushScheduler,
    labels: Arc<LabelSet>,
    process: ProcessHandle,
}

impl SystemMetrics {
    /// Creates an idle collector reading counters from the operating system.
    pub fn new(exporter: Arc<dyn Exporter>, config: CollectorConfig) -> Result<Self, Error> {
        Self::with_probe(exporter, config, Arc::new(OsProbe::new()))
    }

    /// Creates an idle collector reading counters from `probe`.
    pub fn with_probe(
        exporter: Arc<dyn Exporter>,
        config: CollectorConfig,
        probe: Arc<dyn SystemProbe>,
    ) -> Result<Self, Error> {
        let CollectorConfig {
            interval,
            labels,
            process,
            collect_process,
            collect_heap,
            custom_sources,
        } = config;

        let labels = Arc::new(labels);
        let ctx = SourceContext::new(probe, labels.clone());

        let mut registry = ObserverRegistry::new();
        sources::register_host_sources(&mut registry, &ctx)?;
        if cfg!(feature = "process") && collect_process {
            sources::register_process_sources(&mut registry, &ctx, process)?;
        }
        if cfg!(feature = "jemalloc") && collect_heap {
            sources::register_heap_sources(&mut registry, &ctx)?;
        }
        for (descriptor, callback) in custom_sources {
            registry.register_shared(descriptor, callback)?;
        }

        let scheduler = PushScheduler::new(Arc::new(registry), exporter, interval)?;
        Ok(Self {
            scheduler,
            labels,
            process,
        })
    }

    /// Creates a collector and starts it right away.
    pub fn spawn(exporter: Arc<dyn Exporter>, config: CollectorConfig) -> Result<Self, Error> {
        let metrics = Self::new(exporter, config)?;
        metrics.start()?;
        Ok(metrics)
    }

    /// Starts periodic collection.
    pub fn start(&self) -> Result<(), Error> {
        self.scheduler.start()
    }

    /// Stops periodic collection, waiting for a pass in progress.
    pub fn stop(&self) -> Result<(), Error> {
        self.scheduler.stop()
    }

    /// Runs one collection pass on the calling thread and exports it.
    pub fn collect_once(&self) -> Result<TickSummary, Error> {
        self.scheduler.collect_once()
    }

    /// The scheduler state.
    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// The collection interval.
    pub fn interval(&self) -> Duration {
        self.scheduler.interval()
    }

    /// The static labels attached to every observation.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// The process runtime metrics are collected for.
    pub fn process(&self) -> ProcessHandle {
        self.process
    }

    /// The registered metric sources.
    pub fn registry(&self) -> &ObserverRegistry {
        self.scheduler.registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{CpuTimes, NetIoCounters, ProcessMemory, VirtualMemory};
    use crate::protocol::{MetricDescriptor, MetricValue, ValueKind};
    use crate::registry::Observer;
    use crate::test::{StaticProbe, TestExporter};

    fn probe() -> StaticProbe {
        StaticProbe::default()
            .with_cpu_times(CpuTimes {
                user: 10.0,
                system: 2.0,
                idle: Some(50.0),
                ..Default::default()
            })
            .with_virtual_memory(VirtualMemory {
                total: 4096,
                available: Some(1024),
            })
            .with_net_io_counters(NetIoCounters {
                bytes_sent: 10,
                bytes_recv: 20,
            })
            .with_process_memory(std::process::id(), ProcessMemory { rss: 512 })
    }

    #[test]
    fn test_catalogue_order() {
        let metrics = SystemMetrics::with_probe(
            TestExporter::new(),
            CollectorConfig::default().add_label("host", "h1"),
            Arc::new(probe()),
        )
        .unwrap();

        let names: Vec<_> = metrics
            .registry()
            .descriptors()
            .map(|d| d.name.as_str())
            .collect();
        let mut expected = vec![
            "mem.available",
            "mem.total",
            "cpu.user",
            "cpu.nice",
            "cpu.sys",
            "cpu.idle",
            "cpu.usage",
            "cpu.total",
            "net.bytes_sent",
            "net.bytes_recv",
        ];
        if cfg!(feature = "process") {
            expected.push("runtime.rust.mem.rss");
        }
        if cfg!(feature = "jemalloc") {
            expected.extend([
                "runtime.rust.heap.allocated",
                "runtime.rust.heap.active",
                "runtime.rust.heap.resident",
            ]);
        }
        assert_eq!(names, expected);

        for descriptor in metrics.registry().descriptors() {
            assert!(descriptor.label_keys.contains("host"), "{}", descriptor.name);
        }
        assert_eq!(metrics.interval(), Duration::from_secs(30));
        assert_eq!(metrics.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_collect_once() {
        let exporter = TestExporter::new();
        let metrics = SystemMetrics::with_probe(
            exporter.clone(),
            CollectorConfig::default().add_label("host", "h1"),
            Arc::new(probe()),
        )
        .unwrap();

        let summary = metrics.collect_once().unwrap();
        // cpu.nice is missing from the probe reading, and so are heap stats
        let expected_failures = if cfg!(feature = "jemalloc") { 4 } else { 1 };
        assert_eq!(summary.failures.len(), expected_failures);

        let batch = exporter.fetch_and_clear_batches().pop().unwrap();
        assert_eq!(batch.len(), summary.observations);
        assert!(batch.get("cpu.nice").is_none());
        assert_eq!(batch.get("cpu.usage").unwrap().value, MetricValue::Float(12.0));
        assert_eq!(batch.get("cpu.total").unwrap().value, MetricValue::Float(62.0));
        assert_eq!(batch.get("mem.total").unwrap().value, MetricValue::Int(4096));
        for point in &batch.points {
            assert_eq!(point.labels.get("host"), Some("h1"));
        }
    }

    #[test]
    fn test_custom_sources_and_duplicates() {
        let config = CollectorConfig::default()
            .with_process_metrics(false)
            .add_source(
                MetricDescriptor::new("app.queue.depth", ValueKind::Int),
                |observer: &mut dyn Observer| {
                    observer.observe(MetricValue::Int(7), &LabelSet::new());
                    Ok(())
                },
            );
        let metrics =
            SystemMetrics::with_probe(TestExporter::new(), config, Arc::new(probe())).unwrap();
        assert_eq!(
            metrics.registry().bindings().last().unwrap().name(),
            "app.queue.depth"
        );
        assert!(metrics.registry().get("runtime.rust.mem.rss").is_none());

        let config = CollectorConfig::default().add_source(
            MetricDescriptor::new("cpu.user", ValueKind::Float),
            |_: &mut dyn Observer| Ok(()),
        );
        let err = SystemMetrics::with_probe(TestExporter::new(), config, Arc::new(probe()))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateMetricName(ref name) if name == "cpu.user"));
    }

    #[test]
    fn test_zero_interval() {
        let err = SystemMetrics::with_probe(
            TestExporter::new(),
            CollectorConfig::default().with_interval(Duration::ZERO),
            Arc::new(probe()),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInterval));
    }
}
