//! Built-in metric sources.
//!
//! Each source reads its counters through a [`SystemProbe`] and emits one
//! observation tagged with the collector's static labels:
//! - CPU time breakdown (`cpu.*`)
//! - System memory (`mem.*`)
//! - Network I/O (`net.*`)
//! - Process runtime memory (`runtime.rust.*`)

use std::sync::Arc;

use crate::error::{Error, SourceError};
use crate::probe::SystemProbe;
use crate::protocol::{LabelSet, MetricDescriptor, MetricValue, ValueKind};
use crate::registry::{Observer, ObserverRegistry};

mod cpu;
mod memory;
mod network;
mod runtime;

pub use runtime::RUNTIME_NAME;

/// Shared state handed to every built-in source.
#[derive(Clone)]
pub(crate) struct SourceContext {
    probe: Arc<dyn SystemProbe>,
    labels: Arc<LabelSet>,
}

impl SourceContext {
    pub(crate) fn new(probe: Arc<dyn SystemProbe>, labels: Arc<LabelSet>) -> Self {
        Self { probe, labels }
    }

    /// Builds a descriptor declaring the static label keys.
    fn descriptor(
        &self,
        name: &str,
        description: &str,
        unit: &str,
        value_kind: ValueKind,
    ) -> MetricDescriptor {
        MetricDescriptor::new(name, value_kind)
            .with_description(description)
            .with_unit(unit)
            .with_label_keys(self.labels.keys())
    }

    /// Wraps a probe reading into a callback emitting one observation.
    fn source<R, V>(
        &self,
        read: R,
    ) -> impl Fn(&mut dyn Observer) -> Result<(), SourceError> + Send + Sync + 'static
    where
        R: Fn(&dyn SystemProbe) -> Result<V, SourceError> + Send + Sync + 'static,
        V: Into<MetricValue> + 'static,
    {
        let probe = self.probe.clone();
        let labels = self.labels.clone();
        move |observer: &mut dyn Observer| {
            let value = read(&*probe)?;
            observer.observe(value.into(), &labels);
            Ok(())
        }
    }
}

/// Registers the host-wide catalogue: memory, CPU and network.
pub(crate) fn register_host_sources(
    registry: &mut ObserverRegistry,
    ctx: &SourceContext,
) -> Result<(), Error> {
    memory::register(registry, ctx)?;
    cpu::register(registry, ctx)?;
    network::register(registry, ctx)
}

pub(crate) use runtime::{register_heap_sources, register_process_sources};
