//! Platform specific counter readers backing [`OsProbe`](super::OsProbe).
//!
//! Memory, network and process counters come from `sysinfo`. It has no
//! per-mode CPU time breakdown, so that one is read from `/proc/stat` on
//! Linux and `GetSystemTimes` on Windows.

use std::io;

use sysinfo::{Networks, Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::{CpuTimes, HeapStats, NetIoCounters, ProcessHandle, ProcessMemory, VirtualMemory};
use crate::error::SourceError;

#[cfg(target_os = "linux")]
pub fn cpu_times() -> Result<CpuTimes, SourceError> {
    let stat = std::fs::read_to_string("/proc/stat")?;
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks <= 0 {
        return Err(SourceError::Io(io::Error::last_os_error()));
    }
    super::procfs::parse_stat(&stat, ticks as f64)
}

#[cfg(target_os = "windows")]
pub fn cpu_times() -> Result<CpuTimes, SourceError> {
    use windows_sys::Win32::Foundation::FILETIME;
    use windows_sys::Win32::System::Threading::GetSystemTimes;

    fn seconds(time: &FILETIME) -> f64 {
        // FILETIME is in 100-nanosecond intervals
        let ticks = ((time.dwHighDateTime as u64) << 32) | (time.dwLowDateTime as u64);
        ticks as f64 / 10_000_000.0
    }

    unsafe {
        let mut idle: FILETIME = std::mem::zeroed();
        let mut kernel: FILETIME = std::mem::zeroed();
        let mut user: FILETIME = std::mem::zeroed();
        if GetSystemTimes(&mut idle, &mut kernel, &mut user) == 0 {
            return Err(SourceError::Io(io::Error::last_os_error()));
        }

        // kernel time includes idle time
        let idle = seconds(&idle);
        Ok(CpuTimes {
            user: seconds(&user),
            system: (seconds(&kernel) - idle).max(0.0),
            idle: Some(idle),
            ..Default::default()
        })
    }
}

#[cfg(not(any(target_os = "linux", target_os = "windows")))]
pub fn cpu_times() -> Result<CpuTimes, SourceError> {
    Err(SourceError::Unsupported("cpu times"))
}

pub fn virtual_memory(system: &mut System) -> Result<VirtualMemory, SourceError> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(SourceError::Unsupported("virtual memory"));
    }
    system.refresh_memory();
    Ok(VirtualMemory {
        total: system.total_memory(),
        available: Some(system.available_memory()),
    })
}

pub fn net_io_counters(networks: &mut Networks) -> Result<NetIoCounters, SourceError> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(SourceError::Unsupported("network i/o counters"));
    }
    // interfaces come and go
    networks.refresh_list();
    Ok(networks
        .iter()
        .fold(NetIoCounters::default(), |acc, (_, data)| NetIoCounters {
            bytes_sent: acc.bytes_sent.saturating_add(data.total_transmitted()),
            bytes_recv: acc.bytes_recv.saturating_add(data.total_received()),
        }))
}

pub fn process_memory(
    system: &mut System,
    process: &ProcessHandle,
) -> Result<ProcessMemory, SourceError> {
    if !sysinfo::IS_SUPPORTED_SYSTEM {
        return Err(SourceError::Unsupported("process memory"));
    }
    let pid = Pid::from_u32(process.pid());
    let refreshed = system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        ProcessRefreshKind::new().with_memory(),
    );
    let found = system.process(pid).filter(|_| refreshed > 0);
    let Some(found) = found else {
        return Err(SourceError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no process with pid {pid}"),
        )));
    };
    Ok(ProcessMemory {
        rss: found.memory(),
    })
}

#[cfg(all(unix, feature = "jemalloc"))]
pub fn heap_stats() -> Result<HeapStats, SourceError> {
    use tikv_jemalloc_ctl::{epoch, stats};

    fn jemalloc(err: tikv_jemalloc_ctl::Error) -> SourceError {
        SourceError::parse(format!("jemalloc: {err}"))
    }

    // Advance the epoch to get fresh stats
    epoch::advance().map_err(jemalloc)?;

    Ok(HeapStats {
        allocated: stats::allocated::read().map_err(jemalloc)? as u64,
        active: stats::active::read().map_err(jemalloc)? as u64,
        resident: stats::resident::read().map_err(jemalloc)? as u64,
    })
}

#[cfg(not(all(unix, feature = "jemalloc")))]
pub fn heap_stats() -> Result<HeapStats, SourceError> {
    Err(SourceError::Unsupported("heap statistics"))
}
