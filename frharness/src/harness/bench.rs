//! Cache timing calibration (`monitor -b`)
//!
//! In bench mode the monitor times loads it knows to be cached (`0: <cycles>`)
//! and loads it knows come from memory (`1: <cycles>`). The two distributions
//! tell the operator where to put `--threshold`.

#![allow(clippy::cast_precision_loss)]

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::domain::CaptureError;

const L1_MARKER: &str = "0:";
const MEMORY_MARKER: &str = "1:";

/// Timings at or above these are treated as noise.
const L1_OUTLIER_CYCLES: u64 = 300;
const MEMORY_OUTLIER_CYCLES: u64 = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchSamples {
    pub l1: Vec<u64>,
    pub memory: Vec<u64>,
}

/// Split bench output into the two timing classes, dropping outliers.
#[must_use]
pub fn parse_bench_output(output: &str) -> BenchSamples {
    let mut samples = BenchSamples::default();

    for line in output.lines().map(str::trim) {
        if let Some(v) = line.strip_prefix(L1_MARKER).and_then(|v| v.trim().parse::<u64>().ok()) {
            if v < L1_OUTLIER_CYCLES {
                samples.l1.push(v);
            }
        } else if let Some(v) =
            line.strip_prefix(MEMORY_MARKER).and_then(|v| v.trim().parse::<u64>().ok())
        {
            if v < MEMORY_OUTLIER_CYCLES {
                samples.memory.push(v);
            }
        }
    }

    samples
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub count: usize,
    pub min: u64,
    pub median: u64,
    pub max: u64,
    pub mean: f64,
}

impl TimingSummary {
    #[must_use]
    pub fn from_samples(samples: &[u64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_unstable();
        let sum: u64 = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            min: sorted[0],
            median: sorted[sorted.len() / 2],
            max: sorted[sorted.len() - 1],
            mean: sum as f64 / sorted.len() as f64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchReport {
    pub l1: Option<TimingSummary>,
    pub memory: Option<TimingSummary>,
}

impl BenchReport {
    #[must_use]
    pub fn from_samples(samples: &BenchSamples) -> Self {
        Self {
            l1: TimingSummary::from_samples(&samples.l1),
            memory: TimingSummary::from_samples(&samples.memory),
        }
    }

    /// Midpoint between the cached and uncached medians.
    #[must_use]
    pub fn suggested_threshold(&self) -> Option<u64> {
        let (l1, memory) = (self.l1?, self.memory?);
        Some((l1.median + memory.median) / 2)
    }
}

pub struct CacheBench {
    monitor: PathBuf,
}

impl CacheBench {
    #[must_use]
    pub fn new(monitor: impl Into<PathBuf>) -> Self {
        Self { monitor: monitor.into() }
    }

    /// Run the monitor in bench mode and summarise its timings.
    ///
    /// # Errors
    /// `Spawn` if the monitor cannot run; `Io` if it outlives `timeout`.
    pub async fn run(&self, timeout: Duration) -> Result<BenchReport, CaptureError> {
        let child = Command::new(&self.monitor)
            .arg("-b")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.monitor.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "bench timed out"))??;

        let samples = parse_bench_output(&String::from_utf8_lossy(&output.stdout));
        Ok(BenchReport::from_samples(&samples))
    }
}
