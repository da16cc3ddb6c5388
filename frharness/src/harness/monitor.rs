//! Flush+Reload monitor process
//!
//! The monitor is invoked as
//! `monitor -e <target> -t <threshold> -s <slot> -p <probe,probe,...>` and
//! prints one line per run: `[-] ...` for information, `[!] ...` for an
//! error, anything else is the captured trace.

use log::{debug, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::domain::{CaptureError, Probe};

pub const INFO_MARKER: &str = "[-]";
pub const ERROR_MARKER: &str = "[!]";

/// Cycle count separating a cache hit from a miss.
pub const DEFAULT_THRESHOLD: u32 = 120;
/// Time-slot width; controls how long each trace string is.
pub const DEFAULT_SLOT: u32 = 2048;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub monitor: PathBuf,
    pub target: PathBuf,
    pub threshold: u32,
    pub slot: u32,
    pub probes: Vec<Probe>,
    /// How long to wait for the monitor's output before declaring a miss.
    pub capture_deadline: Duration,
}

impl MonitorConfig {
    /// Probe list as passed to `-p`.
    #[must_use]
    pub fn probe_arg(&self) -> String {
        self.probes.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
    }
}

/// One classified line of monitor output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorLine<'a> {
    Informational(&'a str),
    Error(&'a str),
    Trace(&'a str),
}

impl<'a> MonitorLine<'a> {
    #[must_use]
    pub fn classify(line: &'a str) -> Self {
        if line.starts_with(INFO_MARKER) {
            Self::Informational(line)
        } else if line.starts_with(ERROR_MARKER) {
            Self::Error(line)
        } else {
            Self::Trace(line)
        }
    }
}

/// Turn the monitor's complete output into a trace, nothing, or an error.
///
/// Anything on stderr, or an `[!]` line, is an error carrying both streams.
/// Informational and blank lines are skipped; the first remaining line is
/// the trace.
///
/// # Errors
/// `MonitorReported` as described above.
pub fn classify_output(stdout: &str, stderr: &str) -> Result<Option<String>, CaptureError> {
    let reported =
        || CaptureError::MonitorReported { stdout: stdout.to_string(), stderr: stderr.to_string() };

    if !stderr.trim().is_empty() {
        return Err(reported());
    }

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        match MonitorLine::classify(line) {
            MonitorLine::Informational(info) => debug!("{info}"),
            MonitorLine::Error(_) => return Err(reported()),
            MonitorLine::Trace(trace) => return Ok(Some(trace.to_string())),
        }
    }
    Ok(None)
}

pub struct MonitorProcess {
    config: MonitorConfig,
    child: Option<Child>,
}

impl MonitorProcess {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self { config, child: None }
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Start the monitor. Starting an already running monitor is a no-op.
    ///
    /// # Errors
    /// `Spawn` if the binary cannot be executed.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.child.is_some() {
            warn!("Monitor process exists. Doing nothing.");
            return Ok(());
        }

        let child = Command::new(&self.config.monitor)
            .arg("-e")
            .arg(&self.config.target)
            .arg("-t")
            .arg(self.config.threshold.to_string())
            .arg("-s")
            .arg(self.config.slot.to_string())
            .arg("-p")
            .arg(self.config.probe_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.config.monitor.display().to_string(),
                source,
            })?;

        self.child = Some(child);
        Ok(())
    }

    /// Wait up to `deadline` for the monitor to finish and classify its output.
    ///
    /// On timeout the monitor is killed and `Ok(None)` is returned. The
    /// process handle and its pipes are released on every path.
    ///
    /// # Errors
    /// `MonitorReported` for an error marker or stderr output; `Io` if the
    /// pipes cannot be read.
    pub async fn collect(&mut self, deadline: Duration) -> Result<Option<String>, CaptureError> {
        let Some(mut child) = self.child.take() else {
            warn!("Monitor process does not exist. Doing nothing.");
            return Ok(None);
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let communicate = async {
            // Monitor output is not guaranteed to be UTF-8.
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let read_out = async {
                match stdout_pipe.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut stdout).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            let read_err = async {
                match stderr_pipe.as_mut() {
                    Some(pipe) => pipe.read_to_end(&mut stderr).await.map(|_| ()),
                    None => Ok(()),
                }
            };
            tokio::try_join!(read_out, read_err)?;
            child.wait().await?;
            Ok::<_, std::io::Error>((stdout, stderr))
        };

        let outcome = tokio::time::timeout(deadline, communicate).await;
        drop(stdout_pipe);
        drop(stderr_pipe);

        match outcome {
            Ok(result) => {
                let (stdout, stderr) = result?;
                let (stdout, stderr) =
                    (String::from_utf8_lossy(&stdout), String::from_utf8_lossy(&stderr));
                classify_output(&stdout, &stderr)
            }
            Err(_) => {
                debug!("Monitor produced no output within {deadline:?}, killing it");
                child.kill().await?;
                Ok(None)
            }
        }
    }

    /// Kill the monitor if it is running.
    ///
    /// # Errors
    /// Returns an error if the process cannot be reaped.
    pub async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(mut child) = self.child.take() else {
            warn!("Monitor process does not exist. Doing nothing.");
            return Ok(());
        };
        child.kill().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_lines() {
        assert_eq!(MonitorLine::classify("[-] waiting"), MonitorLine::Informational("[-] waiting"));
        assert_eq!(MonitorLine::classify("[!] bad args"), MonitorLine::Error("[!] bad args"));
        assert_eq!(MonitorLine::classify("AB|B|A"), MonitorLine::Trace("AB|B|A"));
    }

    #[test]
    fn test_classify_output_skips_info() {
        let trace = classify_output("[-] mapped target\nA|AB|B\n", "").unwrap();
        assert_eq!(trace.as_deref(), Some("A|AB|B"));
    }

    #[test]
    fn test_classify_output_info_only_is_empty() {
        assert_eq!(classify_output("[-] nothing seen\n\n", "").unwrap(), None);
        assert_eq!(classify_output("", "").unwrap(), None);
    }

    #[test]
    fn test_classify_output_error_marker() {
        let err = classify_output("[!] bad args\n", "").unwrap_err();
        match err {
            CaptureError::MonitorReported { stdout, .. } => {
                assert!(stdout.contains("[!] bad args"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_classify_output_stderr_is_error() {
        let err = classify_output("A|B\n", "segfault\n").unwrap_err();
        assert!(err.to_string().contains("segfault"));
    }

    #[test]
    fn test_probe_arg_joins_with_commas() {
        let config = MonitorConfig {
            monitor: PathBuf::from("spy"),
            target: PathBuf::from("target"),
            threshold: DEFAULT_THRESHOLD,
            slot: DEFAULT_SLOT,
            probes: vec![Probe::new("A", 0x0040_10a0), Probe::new("B", 0x0040_11f0)],
            capture_deadline: Duration::from_secs(1),
        };
        assert_eq!(config.probe_arg(), "A:0x4010a0,B:0x4011f0");
    }
}
