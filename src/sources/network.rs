use super::SourceContext;
use crate::error::Error;
use crate::protocol::ValueKind;
use crate::registry::ObserverRegistry;

pub(super) fn register(registry: &mut ObserverRegistry, ctx: &SourceContext) -> Result<(), Error> {
    registry.register(
        ctx.descriptor("net.bytes_sent", "Network:bytes sent", "bytes", ValueKind::Int),
        ctx.source(|probe| Ok(probe.net_io_counters()?.bytes_sent)),
    )?;
    registry.register(
        ctx.descriptor("net.bytes_recv", "Network:bytes received", "bytes", ValueKind::Int),
        ctx.source(|probe| Ok(probe.net_io_counters()?.bytes_recv)),
    )
}
