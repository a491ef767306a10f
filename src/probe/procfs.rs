//! Parser for the `/proc/stat` CPU breakdown read on Linux.
//!
//! It only deals with text so it can be tested on every platform.

use super::CpuTimes;
use crate::error::SourceError;

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Values are clock ticks and get divided by `ticks_per_second`. Columns
/// missing on older kernels are reported as `None`.
pub fn parse_stat(stat: &str, ticks_per_second: f64) -> Result<CpuTimes, SourceError> {
    let line = stat
        .lines()
        .find(|line| line.starts_with("cpu "))
        .ok_or_else(|| SourceError::parse("no aggregate cpu line in /proc/stat"))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|field| {
            field
                .parse::<u64>()
                .map(|ticks| ticks as f64 / ticks_per_second)
                .map_err(|err| SourceError::parse(format!("cpu field {field:?}: {err}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() < 4 {
        return Err(SourceError::parse(format!(
            "expected at least 4 cpu fields, got {}",
            values.len()
        )));
    }
    let field = |idx: usize| values.get(idx).copied();

    Ok(CpuTimes {
        user: values[0],
        nice: field(1),
        system: values[2],
        idle: field(3),
        iowait: field(4),
        irq: field(5),
        softirq: field(6),
        steal: field(7),
    })
}
