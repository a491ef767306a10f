//! Collects system metrics every two seconds and logs them.
//!
//! Run with `RUST_LOG=info cargo run --example log-exporter`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use system_metrics::{
    Batch, CollectorConfig, ExportError, Exporter, LabelSet, LogExporter, MetricDescriptor,
    MetricValue, Observer, SystemMetrics, ValueKind,
};

/// Logs every batch and prints it as JSON.
struct JsonExporter {
    inner: LogExporter,
}

impl Exporter for JsonExporter {
    fn export(&self, batch: Batch) -> Result<(), ExportError> {
        let json = serde_json::to_string_pretty(&batch)
            .map_err(|err| ExportError::with_source("could not serialize batch", err))?;
        println!("{json}");
        self.inner.export(batch)
    }
}

fn main() {
    pretty_env_logger::init();

    let requests = Arc::new(AtomicUsize::new(0));
    let config = CollectorConfig::new()
        .with_interval(Duration::from_secs(2))
        .add_label("host", "demo")
        .add_source(
            MetricDescriptor::new("app.requests", ValueKind::Int)
                .with_description("Requests served")
                .with_unit("requests"),
            {
                let requests = requests.clone();
                move |observer: &mut dyn Observer| {
                    let served = requests.load(Ordering::Relaxed);
                    observer.observe(MetricValue::from(served), &LabelSet::new());
                    Ok(())
                }
            },
        );

    let exporter = Arc::new(JsonExporter { inner: LogExporter });
    let metrics = match SystemMetrics::spawn(exporter, config) {
        Ok(metrics) => metrics,
        Err(err) => {
            log::error!("could not start the collector: {err}");
            return;
        }
    };

    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(500));
        requests.fetch_add(7, Ordering::Relaxed);
    }

    if let Err(err) = metrics.stop() {
        log::error!("could not stop the collector: {err}");
    }
}
