//! Periodic collection of host and process metrics.
//!
//! This crate samples system counters (CPU time breakdown, memory, network
//! I/O, process memory) on a fixed interval and pushes every sample to a
//! pluggable [`Exporter`], tagged with a static set of labels.
//!
//! # Overview
//!
//! - An [`ObserverRegistry`] holds the fixed, ordered set of named metric
//!   sources. Each source is a [`MetricDescriptor`] bound to a callback that
//!   reports observations through an [`Observer`].
//! - A [`PushScheduler`] runs every callback once per interval on a
//!   background thread and hands the resulting [`Batch`] to the exporter.
//!   Sources that fail are logged and left out of the batch.
//! - [`SystemMetrics`] wires the built-in sources, the [`SystemProbe`] they
//!   read from and the scheduler together.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use system_metrics::{Batch, CollectorConfig, ExportError, SystemMetrics};
//!
//! let exporter = |batch: Batch| -> Result<(), ExportError> {
//!     for point in &batch.points {
//!         println!("{} = {}", point.name(), point.value);
//!     }
//!     Ok(())
//! };
//!
//! let metrics = SystemMetrics::spawn(
//!     Arc::new(exporter),
//!     CollectorConfig::new()
//!         .with_interval(Duration::from_secs(10))
//!         .add_label("host", "web-1"),
//! )
//! .unwrap();
//!
//! // ... later, during shutdown
//! metrics.stop().unwrap();
//! ```
//!
//! # Features
//!
//! - `feature = "process"` (default): collect `runtime.rust.mem.rss`.
//! - `feature = "jemalloc"`: collect `runtime.rust.heap.*` from jemalloc.
//! - `feature = "test"`: activates the `test` module with a capturing
//!   exporter and a probe serving fixed readings.

#![warn(missing_docs)]

mod collector;
mod config;
mod error;
mod exporter;
mod protocol;
mod registry;
mod scheduler;
mod sources;

pub mod probe;


pub use collector::SystemMetrics;
pub use config::{CollectorConfig, DEFAULT_INTERVAL};
pub use error::{Error, ExportError, SourceError};
pub use exporter::{Exporter, LogExporter};
pub use probe::{OsProbe, ProcessHandle, SystemProbe};
pub use protocol::{Batch, LabelSet, MetricDescriptor, MetricValue, Point, ValueKind};
pub use registry::{Binding, ObservationCallback, Observer, ObserverRegistry};
pub use scheduler::{PushScheduler, SchedulerState, TickSummary};
pub use sources::RUNTIME_NAME;
