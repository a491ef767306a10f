//! Access to raw host and process counters.
//!
//! Metric sources never talk to the OS directly. They go through a
//! [`SystemProbe`], which makes them testable with fixed readings and keeps
//! the platform specifics in one place.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use sysinfo::{Networks, System};

use crate::error::SourceError;

mod os;
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
pub(crate) mod procfs;

/// Cumulative CPU time spent in each mode, in seconds.
///
/// Fields that only exist on some platforms are `None` where they are not
/// reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuTimes {
    /// Time spent in user mode.
    pub user: f64,
    /// Time spent in kernel mode.
    pub system: f64,
    /// Time spent by niced processes in user mode.
    pub nice: Option<f64>,
    /// Time spent waiting for I/O.
    pub iowait: Option<f64>,
    /// Time spent servicing hardware interrupts.
    pub irq: Option<f64>,
    /// Time spent servicing software interrupts.
    pub softirq: Option<f64>,
    /// Time stolen by the hypervisor.
    pub steal: Option<f64>,
    /// Time spent idle.
    pub idle: Option<f64>,
}

impl CpuTimes {
    /// Time spent doing anything but idling.
    ///
    /// Sums user and system time plus every optional non-idle field the
    /// platform reports; missing fields count as zero.
    pub fn busy(&self) -> f64 {
        [self.nice, self.iowait, self.irq, self.softirq, self.steal]
            .into_iter()
            .flatten()
            .fold(self.user + self.system, |acc, v| acc + v)
    }

    /// Busy time plus idle time.
    pub fn total(&self) -> f64 {
        self.busy() + self.idle.unwrap_or(0.0)
    }
}

/// System-wide virtual memory, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMemory {
    /// Total physical memory.
    pub total: u64,
    /// Memory that can be handed to processes without swapping.
    pub available: Option<u64>,
}

/// Cumulative network I/O since boot, summed over all interfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetIoCounters {
    /// Bytes sent.
    pub bytes_sent: u64,
    /// Bytes received.
    pub bytes_recv: u64,
}

/// Memory usage of a single process, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessMemory {
    /// Resident set size.
    pub rss: u64,
}

/// Allocator statistics of the current process, in bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    /// Bytes handed out to the application.
    pub allocated: u64,
    /// Bytes in pages the allocator has in active use.
    pub active: u64,
    /// Bytes physically resident in allocator-owned pages.
    pub resident: u64,
}

/// Handle of the process whose runtime metrics are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessHandle {
    pid: u32,
}

impl ProcessHandle {
    /// The process running this code.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
        }
    }

    /// A handle for an arbitrary process id.
    pub fn from_pid(pid: u32) -> Self {
        Self { pid }
    }

    /// The process id.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns true if this handle refers to the calling process.
    pub fn is_current(&self) -> bool {
        self.pid == std::process::id()
    }
}

impl Default for ProcessHandle {
    fn default() -> Self {
        Self::current()
    }
}

/// Source of raw counters for metric sources.
pub trait SystemProbe: Send + Sync + 'static {
    /// Reads the system-wide CPU time breakdown.
    fn cpu_times(&self) -> Result<CpuTimes, SourceError>;

    /// Reads total and available memory.
    fn virtual_memory(&self) -> Result<VirtualMemory, SourceError>;

    /// Reads cumulative network I/O.
    fn net_io_counters(&self) -> Result<NetIoCounters, SourceError>;

    /// Reads memory usage of `process`.
    fn process_memory(&self, process: &ProcessHandle) -> Result<ProcessMemory, SourceError>;

    /// Reads allocator statistics of the current process.
    fn heap_stats(&self) -> Result<HeapStats, SourceError> {
        Err(SourceError::Unsupported("heap statistics"))
    }
}

/// Reads counters from the operating system.
///
/// Memory, network and process counters are read through `sysinfo`. The
/// per-mode CPU breakdown comes from procfs on Linux and the Win32 API on
/// Windows. Counters a platform does not offer fail with
/// [`SourceError::Unsupported`].
pub struct OsProbe {
    system: Mutex<System>,
    networks: Mutex<Networks>,
}

impl OsProbe {
    /// Creates a new probe.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            networks: Mutex::new(Networks::new()),
        }
    }
}

impl std::fmt::Debug for OsProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsProbe").finish_non_exhaustive()
    }
}

impl Default for OsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for OsProbe {
    fn cpu_times(&self) -> Result<CpuTimes, SourceError> {
        os::cpu_times()
    }

    fn virtual_memory(&self) -> Result<VirtualMemory, SourceError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        os::virtual_memory(&mut system)
    }

    fn net_io_counters(&self) -> Result<NetIoCounters, SourceError> {
        let mut networks = self.networks.lock().unwrap_or_else(PoisonError::into_inner);
        os::net_io_counters(&mut networks)
    }

    fn process_memory(&self, process: &ProcessHandle) -> Result<ProcessMemory, SourceError> {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        os::process_memory(&mut system, process)
    }

    fn heap_stats(&self) -> Result<HeapStats, SourceError> {
        os::heap_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_times_sums() {
        let times = CpuTimes {
            user: 10.0,
            system: 5.0,
            nice: Some(1.0),
            iowait: Some(0.5),
            irq: None,
            softirq: Some(0.25),
            steal: None,
            idle: Some(100.0),
        };
        assert_eq!(times.busy(), 16.75);
        assert_eq!(times.total(), 116.75);
    }

    #[test]
    fn test_process_handle() {
        let handle = ProcessHandle::current();
        assert!(handle.is_current());
        assert_eq!(handle.pid(), std::process::id());
        assert!(!ProcessHandle::from_pid(handle.pid().wrapping_add(1)).is_current());
    }

    #[test]
    fn test_os_probe_reads_live_counters() {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return;
        }
        let probe = OsProbe::new();

        let memory = probe.virtual_memory().unwrap();
        assert!(memory.total > 0);
        assert!(memory.available.unwrap() <= memory.total);

        assert!(probe.net_io_counters().is_ok());

        let rss = probe.process_memory(&ProcessHandle::current()).unwrap().rss;
        assert!(rss > 0);
        assert!(matches!(
            probe.process_memory(&ProcessHandle::from_pid(u32::MAX)),
            Err(SourceError::Io(_))
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_os_probe_cpu_on_linux() {
        let cpu = OsProbe::new().cpu_times().unwrap();
        assert!(cpu.total() >= cpu.busy());
        assert!(cpu.idle.is_some());
    }
}
