//! Fake monitor, target and debugger binaries for integration tests

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use frharness::domain::Probe;
use frharness::harness::MonitorConfig;

/// Write an executable `/bin/sh` script named `name` into `dir`.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A target that idles until it is killed.
pub fn idle_target(dir: &Path) -> PathBuf {
    write_script(dir, "target.sh", "exec sleep 30")
}

pub fn monitor_config(monitor: PathBuf, target: PathBuf, deadline: Duration) -> MonitorConfig {
    MonitorConfig {
        monitor,
        target,
        threshold: 120,
        slot: 2048,
        probes: vec![Probe::new("A", 0x4010a0), Probe::new("B", 0x4011f0)],
        capture_deadline: deadline,
    }
}
