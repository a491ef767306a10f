
use std::sync::Arc;
use std::time::Duration;

use system_metrics::{
    CollectorConfig, Error, LabelSet, MetricDescriptor, MetricValue, Observer, SchedulerState,
    SystemMetrics, ValueKind,
};

use shared::{FakeProbe, RecordingExporter};

fn host_config() -> CollectorConfig {
    CollectorConfig::new()
        .with_interval(Duration::from_secs(1))
        .add_label("host", "h1")
}

#[test]
fn test_timer_exports_labelled_memory() {
    let exporter = RecordingExporter::new();
    let metrics =
        SystemMetrics::with_probe(exporter.clone(), host_config(), Arc::new(FakeProbe::default()))
            .unwrap();
    metrics.start().unwrap();

    assert!(exporter.wait_for(1, Duration::from_secs(5)));
    metrics.stop().unwrap();

    let batch = exporter.batches().remove(0);
    let point = batch.get("mem.available").unwrap();
    assert_eq!(point.labels, LabelSet::new().with("host", "h1"));
    assert_eq!(point.value, MetricValue::Int(3 << 30));
    assert_eq!(point.descriptor.unit, "bytes");
}

#[cfg(target_os = "linux")]
#[test]
fn test_timer_exports_os_memory() {
    let exporter = RecordingExporter::new();
    let metrics = SystemMetrics::spawn(exporter.clone(), host_config()).unwrap();

    assert!(exporter.wait_for(1, Duration::from_secs(5)));
    metrics.stop().unwrap();

    let batch = exporter.batches().remove(0);
    let point = batch.get("mem.available").unwrap();
    assert_eq!(point.labels, LabelSet::new().with("host", "h1"));
    assert!(point.value.as_i64().unwrap() >= 0);
    assert!(batch.get("runtime.rust.mem.rss").is_some() || !cfg!(feature = "process"));
}

#[test]
fn test_no_exports_after_stop() {
    let exporter = RecordingExporter::new();
    let metrics = SystemMetrics::with_probe(
        exporter.clone(),
        host_config().with_interval(Duration::from_millis(50)),
        Arc::new(FakeProbe::default()),
    )
    .unwrap();
    metrics.start().unwrap();
    assert!(exporter.wait_for(2, Duration::from_secs(5)));

    metrics.stop().unwrap();
    assert_eq!(metrics.state(), SchedulerState::Stopped);
    let exported = exporter.count();

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(exporter.count(), exported);
    assert!(metrics.collect_once().is_err());
    assert!(metrics.start().is_err());
}

#[test]
fn test_failing_source_is_left_out() {
    let exporter = RecordingExporter::new();
    let probe = FakeProbe {
        net: None,
        ..FakeProbe::default()
    };
    let metrics = SystemMetrics::with_probe(exporter.clone(), host_config(), Arc::new(probe))
        .unwrap();

    let summary = metrics.collect_once().unwrap();
    let failed: Vec<_> = summary
        .failures
        .iter()
        .map(|err| match err {
            Error::SourceReadFailure { name, .. } => name.as_str(),
            other => panic!("unexpected error: {other}"),
        })
        .collect();
    assert_eq!(failed, ["net.bytes_sent", "net.bytes_recv"]);

    let batch = exporter.batches().remove(0);
    assert_eq!(batch.len(), summary.observations);
    assert!(batch.get("net.bytes_sent").is_none());
    assert!(batch.get("mem.total").is_some());
    assert!(batch.get("cpu.user").is_some());
}

#[test]
fn test_cpu_total_minus_usage_is_idle() {
    let exporter = RecordingExporter::new();
    let metrics = SystemMetrics::with_probe(
        exporter.clone(),
        CollectorConfig::default(),
        Arc::new(FakeProbe::default()),
    )
    .unwrap();
    metrics.collect_once().unwrap();

    let batch = exporter.batches().remove(0);
    let value = |name: &str| batch.get(name).unwrap().value.as_f64();
    assert_eq!(value("cpu.total") - value("cpu.usage"), value("cpu.idle"));
    assert_eq!(value("cpu.usage"), 154.5);
    assert!(batch.get("cpu.user").unwrap().labels.is_empty());
}

#[test]
fn test_custom_source_runs_after_builtins() {
    let exporter = RecordingExporter::new();
    let config = host_config().add_source(
        MetricDescriptor::new("app.connections", ValueKind::Int)
            .with_unit("connections")
            .with_label_keys(["pool"]),
        |observer: &mut dyn Observer| {
            observer.observe(MetricValue::Int(3), &LabelSet::new().with("pool", "a"));
            observer.observe(MetricValue::Int(5), &LabelSet::new().with("pool", "b"));
            Ok(())
        },
    );
    let metrics =
        SystemMetrics::with_probe(exporter.clone(), config, Arc::new(FakeProbe::default()))
            .unwrap();
    metrics.collect_once().unwrap();

    let batch = exporter.batches().remove(0);
    let custom: Vec<_> = batch
        .points
        .iter()
        .filter(|point| point.name() == "app.connections")
        .collect();
    assert_eq!(custom.len(), 2);
    assert_eq!(custom[1].labels.get("pool"), Some("b"));
    assert_eq!(batch.points.last().unwrap().name(), "app.connections");
}

#[test]
fn test_duplicate_custom_source_is_rejected() {
    let config = CollectorConfig::new().add_source(
        MetricDescriptor::new("mem.total", ValueKind::Int),
        |_: &mut dyn Observer| Ok(()),
    );
    let err = SystemMetrics::with_probe(
        RecordingExporter::new(),
        config,
        Arc::new(FakeProbe::default()),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "metric `mem.total` is already registered");
}

#[test]
fn test_batch_wire_format() {
    let exporter = RecordingExporter::new();
    let metrics = SystemMetrics::with_probe(
        exporter.clone(),
        host_config().with_process_metrics(false),
        Arc::new(FakeProbe::default()),
    )
    .unwrap();
    metrics.collect_once().unwrap();

    let batch = exporter.batches().remove(0);
    let json = serde_json::to_value(&batch).unwrap();
    let first = &json["points"][0];
    assert_eq!(first["descriptor"]["name"], "mem.available");
    assert_eq!(first["descriptor"]["value_kind"], "int");
    assert_eq!(first["value"], 3_u64 << 30);
    assert_eq!(first["labels"]["host"], "h1");

    let parsed: system_metrics::Batch = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, batch);
}
