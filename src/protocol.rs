//! Protocol types shared by sources, the scheduler and exporters.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Numeric kind a metric is reported as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Discrete values such as byte or object counts.
    Int,
    /// Fractional values such as CPU seconds.
    Float,
}

/// Static description of a registered metric.
///
/// Descriptors are immutable once handed to the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDescriptor {
    /// Unique dotted-path name, e.g. `cpu.user`.
    pub name: String,

    /// Human readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Unit of measurement (e.g. "bytes", "seconds").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub unit: String,

    /// The kind every observation is reported as.
    pub value_kind: ValueKind,

    /// Label keys observations of this metric may carry.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub label_keys: BTreeSet<String>,
}

impl MetricDescriptor {
    /// Creates a descriptor with no description, unit or label keys.
    pub fn new(name: impl Into<String>, value_kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            unit: String::new(),
            value_kind,
            label_keys: BTreeSet::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the unit.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Declares the label keys observations may carry.
    #[must_use]
    pub fn with_label_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.label_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// A set of `key -> value` labels attached to observations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    /// Creates an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label, replacing any previous value for `key`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a label and returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up a label value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterates over the label keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(map: BTreeMap<String, String>) -> Self {
        LabelSet(map)
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, (key, value)) in self.iter().enumerate() {
            if idx > 0 {
                f.write_str(",")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

/// Metric value representation supporting both integers and floats.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
}

impl MetricValue {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            MetricValue::Int(_) => ValueKind::Int,
            MetricValue::Float(_) => ValueKind::Float,
        }
    }

    /// Converts the value to `kind`.
    ///
    /// Floats are truncated towards zero when converted to integers.
    pub fn coerce(self, kind: ValueKind) -> Self {
        match (self, kind) {
            (MetricValue::Int(v), ValueKind::Float) => MetricValue::Float(v as f64),
            (MetricValue::Float(v), ValueKind::Int) => MetricValue::Int(v as i64),
            (value, _) => value,
        }
    }

    /// Returns the integer value, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            MetricValue::Int(v) => Some(v),
            MetricValue::Float(_) => None,
        }
    }

    /// Returns the value as a float, converting integers.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MetricValue::Int(v) => v as f64,
            MetricValue::Float(v) => v,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Int(v as i64)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

impl From<f32> for MetricValue {
    fn from(v: f32) -> Self {
        MetricValue::Float(v as f64)
    }
}

/// A single observation as handed to an exporter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The metric this observation belongs to.
    pub descriptor: Arc<MetricDescriptor>,
    /// The observed value, already in the descriptor's kind.
    pub value: MetricValue,
    /// Labels attached to the observation.
    #[serde(default, skip_serializing_if = "LabelSet::is_empty")]
    pub labels: LabelSet,
}

impl Point {
    /// Shortcut for the metric name.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// All observations produced by one collection pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// When the collection pass started.
    pub timestamp: SystemTime,
    /// Observations in registration order.
    pub points: Vec<Point>,
}

impl Batch {
    /// Creates an empty batch stamped with the current time.
    pub fn new() -> Self {
        Self {
            timestamp: SystemTime::now(),
            points: Vec::new(),
        }
    }

    /// Returns the first point with the given metric name.
    pub fn get(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|point| point.name() == name)
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if there are no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}
