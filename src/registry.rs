//! Registration of named, callback-driven metric sources.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, SourceError};
use crate::protocol::{LabelSet, MetricDescriptor, MetricValue, Point};

/// Write-only sink handed to observation callbacks.
///
/// Calling [`observe`](Observer::observe) more than once per collection
/// pass is allowed and produces one point per call.
pub trait Observer {
    /// Records one observation.
    fn observe(&mut self, value: MetricValue, labels: &LabelSet);
}

/// The sampling callback bound to a single metric.
pub type ObservationCallback =
    Arc<dyn Fn(&mut dyn Observer) -> Result<(), SourceError> + Send + Sync>;

/// A registered metric: its descriptor plus the callback that samples it.
#[derive(Clone)]
pub struct Binding {
    descriptor: Arc<MetricDescriptor>,
    callback: ObservationCallback,
}

impl Binding {
    /// The descriptor of the bound metric.
    pub fn descriptor(&self) -> &Arc<MetricDescriptor> {
        &self.descriptor
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Runs the callback, returning the points it emitted.
    ///
    /// Points emitted before a failure are discarded together with it.
    pub fn sample(&self) -> Result<Vec<Point>, SourceError> {
        let mut observer = PointObserver::new(&self.descriptor);
        (self.callback)(&mut observer)?;
        Ok(observer.points)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Collects observations for one binding, coercing values to the declared kind.
struct PointObserver<'a> {
    descriptor: &'a Arc<MetricDescriptor>,
    points: Vec<Point>,
}

impl<'a> PointObserver<'a> {
    fn new(descriptor: &'a Arc<MetricDescriptor>) -> Self {
        Self {
            descriptor,
            points: Vec::with_capacity(1),
        }
    }
}

impl Observer for PointObserver<'_> {
    fn observe(&mut self, value: MetricValue, labels: &LabelSet) {
        self.points.push(Point {
            descriptor: self.descriptor.clone(),
            value: value.coerce(self.descriptor.value_kind),
            labels: labels.clone(),
        });
    }
}

/// The ordered, fixed set of metric sources of a collector.
#[derive(Default)]
pub struct ObserverRegistry {
    bindings: Vec<Binding>,
    names: HashSet<String>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `callback` to `descriptor`.
    ///
    /// Fails with [`Error::DuplicateMetricName`] if a metric with the same
    /// name exists; the registry is left untouched in that case.
    pub fn register<F>(&mut self, descriptor: MetricDescriptor, callback: F) -> Result<(), Error>
    where
        F: Fn(&mut dyn Observer) -> Result<(), SourceError> + Send + Sync + 'static,
    {
        self.register_shared(descriptor, Arc::new(callback))
    }

    /// Like [`register`](Self::register) for an already shared callback.
    pub fn register_shared(
        &mut self,
        descriptor: MetricDescriptor,
        callback: ObservationCallback,
    ) -> Result<(), Error> {
        if self.names.contains(&descriptor.name) {
            return Err(Error::DuplicateMetricName(descriptor.name));
        }
        log::debug!("registering metric source {}", descriptor.name);
        self.names.insert(descriptor.name.clone());
        self.bindings.push(Binding {
            descriptor: Arc::new(descriptor),
            callback,
        });
        Ok(())
    }

    /// All bindings in registration order.
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Looks up a binding by metric name.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|binding| binding.name() == name)
    }

    /// Iterates over the registered descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.bindings.iter().map(|binding| &*binding.descriptor)
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.descriptors().map(|d| &d.name))
            .finish()
    }
}
