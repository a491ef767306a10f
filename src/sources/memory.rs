use super::SourceContext;
use crate::error::{Error, SourceError};
use crate::protocol::ValueKind;
use crate::registry::ObserverRegistry;

pub(super) fn register(registry: &mut ObserverRegistry, ctx: &SourceContext) -> Result<(), Error> {
    registry.register(
        ctx.descriptor("mem.available", "Memory available", "bytes", ValueKind::Int),
        ctx.source(|probe| {
            probe
                .virtual_memory()?
                .available
                .ok_or(SourceError::Unsupported("available memory"))
        }),
    )?;
    registry.register(
        ctx.descriptor("mem.total", "Memory total", "bytes", ValueKind::Int),
        ctx.source(|probe| Ok(probe.virtual_memory()?.total)),
    )
}
