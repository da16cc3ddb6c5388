//! Process pair harness
//!
//! Runs the Flush+Reload monitor alongside the target binary, one pair per
//! capture slot:
//! - `monitor`: monitor invocation and output classification
//! - `target`: target invocation with a single input argument
//! - `coordinator`: lock-step pairing under a capture deadline
//! - `bench`: cache timing calibration

pub mod bench;
pub mod coordinator;
pub mod monitor;
pub mod target;

pub use bench::{BenchReport, CacheBench};
pub use coordinator::{Capture, Coordinator};
pub use monitor::{
    classify_output, MonitorConfig, MonitorLine, MonitorProcess, DEFAULT_SLOT, DEFAULT_THRESHOLD,
};
pub use target::TargetProcess;
