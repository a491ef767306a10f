use std::error::Error as StdError;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::scheduler::SchedulerState;

/// Errors raised while building or driving a collector.
#[derive(Debug, Error)]
pub enum Error {
    /// A metric with this name is already registered.
    #[error("metric `{0}` is already registered")]
    DuplicateMetricName(String),
    /// The scheduler cannot perform `operation` in its current state.
    #[error("cannot {operation} a scheduler that is {state}")]
    InvalidStateTransition {
        /// The state the scheduler was in.
        state: SchedulerState,
        /// The rejected operation.
        operation: &'static str,
    },
    /// A single metric source failed to read its counters.
    #[error("failed to read metric `{name}`")]
    SourceReadFailure {
        /// Name of the metric whose callback failed.
        name: String,
        /// What went wrong.
        #[source]
        source: SourceError,
    },
    /// The collection interval must be non-zero.
    #[error("collection interval must be greater than zero")]
    InvalidInterval,
    /// The collection thread could not be started.
    #[error("failed to spawn the collection thread")]
    WorkerSpawn(#[source] io::Error),
}

/// Raised by a metric source when its underlying counter cannot be read.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The counter does not exist on this platform.
    #[error("{0} is not available on this platform")]
    Unsupported(&'static str),
    /// Reading the counter failed at the OS level.
    #[error("i/o error while reading counters")]
    Io(#[from] io::Error),
    /// The counter source returned data that could not be understood.
    #[error("malformed counter data: {0}")]
    Parse(String),
    /// The source callback panicked.
    #[error("metric source panicked")]
    Panicked,
}

impl SourceError {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    pub(crate) fn parse(what: impl fmt::Display) -> Self {
        SourceError::Parse(what.to_string())
    }
}

/// An opaque failure reported by an [`Exporter`](crate::Exporter).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExportError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ExportError {
    /// Creates an export error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        ExportError {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an underlying error with a message.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ExportError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
