use super::SourceContext;
use crate::error::Error;
use crate::probe::ProcessHandle;
use crate::protocol::ValueKind;
use crate::registry::ObserverRegistry;

/// The runtime segment of the `runtime.<name>.*` metric names.
pub const RUNTIME_NAME: &str = "rust";

/// Registers `runtime.rust.mem.rss` for `process`.
pub(crate) fn register_process_sources(
    registry: &mut ObserverRegistry,
    ctx: &SourceContext,
    process: ProcessHandle,
) -> Result<(), Error> {
    registry.register(
        ctx.descriptor(
            &format!("runtime.{RUNTIME_NAME}.mem.rss"),
            "Runtime: memory rss",
            "bytes",
            ValueKind::Int,
        ),
        ctx.source(move |probe| Ok(probe.process_memory(&process)?.rss)),
    )
}

/// Registers the allocator statistics `runtime.rust.heap.*`.
///
/// These stand in for the garbage collector generation counts other
/// runtimes report.
pub(crate) fn register_heap_sources(
    registry: &mut ObserverRegistry,
    ctx: &SourceContext,
) -> Result<(), Error> {
    registry.register(
        ctx.descriptor(
            &format!("runtime.{RUNTIME_NAME}.heap.allocated"),
            "Runtime: heap bytes allocated",
            "bytes",
            ValueKind::Int,
        ),
        ctx.source(|probe| Ok(probe.heap_stats()?.allocated)),
    )?;
    registry.register(
        ctx.descriptor(
            &format!("runtime.{RUNTIME_NAME}.heap.active"),
            "Runtime: heap bytes in active pages",
            "bytes",
            ValueKind::Int,
        ),
        ctx.source(|probe| Ok(probe.heap_stats()?.active)),
    )?;
    registry.register(
        ctx.descriptor(
            &format!("runtime.{RUNTIME_NAME}.heap.resident"),
            "Runtime: heap bytes resident",
            "bytes",
            ValueKind::Int,
        ),
        ctx.source(|probe| Ok(probe.heap_stats()?.resident)),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::SourceError;
    use crate::probe::{HeapStats, ProcessMemory};
    use crate::protocol::{LabelSet, MetricValue};
    use crate::test::StaticProbe;

    #[test]
    fn test_rss_reads_the_given_process() {
        let process = ProcessHandle::from_pid(4242);
        let probe = StaticProbe::default().with_process_memory(4242, ProcessMemory { rss: 7 << 20 });
        let ctx = SourceContext::new(Arc::new(probe), Arc::new(LabelSet::new()));

        let mut registry = ObserverRegistry::new();
        register_process_sources(&mut registry, &ctx, process).unwrap();
        let points = registry.get("runtime.rust.mem.rss").unwrap().sample().unwrap();
        assert_eq!(points[0].value, MetricValue::Int(7 << 20));

        let mut registry = ObserverRegistry::new();
        register_process_sources(&mut registry, &ctx, ProcessHandle::from_pid(1)).unwrap();
        assert!(registry.get("runtime.rust.mem.rss").unwrap().sample().is_err());
    }

    #[test]
    fn test_heap_sources() {
        let probe = StaticProbe::default().with_heap_stats(HeapStats {
            allocated: 100,
            active: 200,
            resident: 300,
        });
        let ctx = SourceContext::new(Arc::new(probe), Arc::new(LabelSet::new()));
        let mut registry = ObserverRegistry::new();
        register_heap_sources(&mut registry, &ctx).unwrap();

        let values: Vec<_> = registry
            .bindings()
            .iter()
            .map(|binding| (binding.name().to_owned(), binding.sample().unwrap()[0].value))
            .collect();
        assert_eq!(
            values,
            vec![
                ("runtime.rust.heap.allocated".to_owned(), MetricValue::Int(100)),
                ("runtime.rust.heap.active".to_owned(), MetricValue::Int(200)),
                ("runtime.rust.heap.resident".to_owned(), MetricValue::Int(300)),
            ]
        );
    }

    #[test]
    fn test_heap_sources_without_stats() {
        let ctx = SourceContext::new(
            Arc::new(StaticProbe::default()),
            Arc::new(LabelSet::new()),
        );
        let mut registry = ObserverRegistry::new();
        register_heap_sources(&mut registry, &ctx).unwrap();
        assert!(matches!(
            registry.bindings()[0].sample(),
            Err(SourceError::Unsupported(_))
        ));
    }
}
