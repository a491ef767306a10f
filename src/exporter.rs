//! Sinks that receive the batches of every collection pass.

use crate::error::ExportError;
use crate::protocol::Batch;

/// Receives the batch produced by every collection pass.
///
/// The collector treats failures as opaque: they are logged and the batch
/// is dropped. Retries, if wanted, belong in the exporter itself.
pub trait Exporter: Send + Sync {
    /// Exports one batch.
    fn export(&self, batch: Batch) -> Result<(), ExportError>;
}

impl<F> Exporter for F
where
    F: Fn(Batch) -> Result<(), ExportError> + Send + Sync,
{
    fn export(&self, batch: Batch) -> Result<(), ExportError> {
        self(batch)
    }
}

/// An exporter that writes every point to the `log` facade at info level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogExporter;

impl Exporter for LogExporter {
    fn export(&self, batch: Batch) -> Result<(), ExportError> {
        for point in &batch.points {
            log::info!(
                "{} {} {} {}",
                point.name(),
                point.value,
                point.descriptor.unit,
                point.labels
            );
        }
        Ok(())
    }
}
