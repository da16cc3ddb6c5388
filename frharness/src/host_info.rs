//! Host snapshots recorded alongside samples
//!
//! Both values are opaque strings to the session store: the load average is
//! appended to each progress line, the CPU description is written once per
//! session.

use anyhow::{Context, Result};
use log::warn;
use std::fs;
use std::process::Command;

const LOADAVG_PATH: &str = "/proc/loadavg";
const ONLINE_CPUS_PATH: &str = "/sys/devices/system/cpu/online";

/// Contents of `/proc/loadavg`, e.g. `0.52 0.58 0.59 1/123 4567`.
///
/// # Errors
/// Returns an error if `/proc/loadavg` cannot be read.
pub fn system_load() -> Result<String> {
    let load = fs::read_to_string(LOADAVG_PATH).context(format!("Failed to read {LOADAVG_PATH}"))?;
    Ok(load.trim_end().to_string())
}

/// CPU make, model and cache layout from `lscpu`.
///
/// Falls back to the online CPU list when `lscpu` is unavailable.
///
/// # Errors
/// Returns an error only if neither source can be read.
pub fn cpu_info() -> Result<String> {
    match Command::new("lscpu").output() {
        Ok(output) if output.status.success() => {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        Ok(output) => warn!("lscpu exited with {}", output.status),
        Err(e) => warn!("lscpu unavailable: {e}"),
    }

    let cpus = online_cpus()?;
    let list: Vec<String> = cpus.iter().map(ToString::to_string).collect();
    Ok(format!("Online CPU(s) list: {}\n", list.join(",")))
}

/// Get list of online CPU IDs from /sys/devices/system/cpu/online
///
/// The format in /sys is like "0-3" or "0-3,8-11" for NUMA systems.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn online_cpus() -> Result<Vec<u32>> {
    let content = fs::read_to_string(ONLINE_CPUS_PATH)
        .context(format!("Failed to read {ONLINE_CPUS_PATH}"))?;
    parse_cpu_list(content.trim())
}

fn parse_cpu_list(list: &str) -> Result<Vec<u32>> {
    let mut cpus = Vec::new();

    for range in list.split(',') {
        if let Some((start, end)) = range.split_once('-') {
            // Range like "0-3"
            let start: u32 = start.parse()?;
            let end: u32 = end.parse()?;
            cpus.extend(start..=end);
        } else {
            // Single CPU like "5"
            cpus.push(range.parse()?);
        }
    }

    Ok(cpus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3").unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(parse_cpu_list("0-1,8-9,12").unwrap(), vec![0, 1, 8, 9, 12]);
        assert!(parse_cpu_list("a-b").is_err());
    }

    #[test]
    fn test_system_load() {
        let result = system_load();

        #[cfg(target_os = "linux")]
        {
            let load = result.expect("Failed to read load average");
            // "<1m> <5m> <15m> <running>/<total> <last pid>"
            assert_eq!(load.split_whitespace().count(), 5);
            assert!(!load.ends_with('\n'));
        }

        #[cfg(not(target_os = "linux"))]
        {
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_online_cpus() {
        let result = online_cpus();

        #[cfg(target_os = "linux")]
        {
            let cpus = result.expect("Failed to read online CPUs");
            assert!(!cpus.is_empty(), "Should have at least one CPU");
            for i in 1..cpus.len() {
                assert!(cpus[i] >= cpus[i - 1]);
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            assert!(result.is_err());
        }
    }
}
