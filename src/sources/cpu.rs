use super::SourceContext;
use crate::error::{Error, SourceError};
use crate::protocol::ValueKind;
use crate::registry::ObserverRegistry;

pub(super) fn register(registry: &mut ObserverRegistry, ctx: &SourceContext) -> Result<(), Error> {
    let seconds = |name, description| ctx.descriptor(name, description, "seconds", ValueKind::Float);

    registry.register(
        seconds("cpu.user", "CPU user metrics"),
        ctx.source(|probe| Ok(probe.cpu_times()?.user)),
    )?;
    registry.register(
        seconds("cpu.nice", "CPU nice metrics"),
        ctx.source(|probe| {
            probe
                .cpu_times()?
                .nice
                .ok_or(SourceError::Unsupported("cpu nice time"))
        }),
    )?;
    registry.register(
        seconds("cpu.sys", "CPU system metrics"),
        ctx.source(|probe| Ok(probe.cpu_times()?.system)),
    )?;
    registry.register(
        seconds("cpu.idle", "CPU idle metrics"),
        ctx.source(|probe| {
            probe
                .cpu_times()?
                .idle
                .ok_or(SourceError::Unsupported("cpu idle time"))
        }),
    )?;
    registry.register(
        seconds("cpu.usage", "CPU usage metrics"),
        ctx.source(|probe| Ok(probe.cpu_times()?.busy())),
    )?;
    registry.register(
        seconds("cpu.total", "CPU total metrics"),
        ctx.source(|probe| Ok(probe.cpu_times()?.total())),
    )
}
