//! Monitor/target pairing for one capture slot
//!
//! Each [`Coordinator::capture`] call owns exactly one monitor and one target
//! process from start to teardown:
//!
//! ```text
//! start monitor ──▶ start target ──▶ wait ≤ deadline for monitor output
//!                                        │
//!                    ┌───────────────────┼────────────────────┐
//!                    ▼                   ▼                    ▼
//!                 trace            [!] / stderr            timeout
//!              Capture::Trace    MonitorReported     kill monitor, Miss
//!                    └───────────────────┴────────────────────┘
//!                                        │
//!                               kill + reap target
//! ```
//!
//! The monitor is started before the target, but nothing checks that it is
//! already observing when the target begins executing. A monitor that is slow
//! to map the target may miss the start of the run; callers that care must
//! account for this themselves (e.g. with a longer slot).

use log::warn;

use super::monitor::{MonitorConfig, MonitorProcess};
use super::target::TargetProcess;
use crate::domain::CaptureError;

/// Result of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
    Trace(String),
    /// The deadline passed, or the monitor printed nothing but information.
    Miss,
}

impl Capture {
    #[must_use]
    pub fn trace(&self) -> Option<&str> {
        match self {
            Self::Trace(t) => Some(t),
            Self::Miss => None,
        }
    }
}

pub struct Coordinator {
    monitor: MonitorProcess,
    target: TargetProcess,
}

impl Coordinator {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        let target = TargetProcess::new(config.target.clone());
        Self { monitor: MonitorProcess::new(config), target }
    }

    #[must_use]
    pub fn config(&self) -> &MonitorConfig {
        self.monitor.config()
    }

    #[must_use]
    pub fn monitor(&self) -> &MonitorProcess {
        &self.monitor
    }

    #[must_use]
    pub fn target(&self) -> &TargetProcess {
        &self.target
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.target.set_input(input);
    }

    /// Run one monitor/target pair for the current input.
    ///
    /// Both processes are released before this returns, whatever the outcome.
    ///
    /// # Errors
    /// `InputNotSet` before any process is spawned; `Spawn` if either binary
    /// cannot run; `MonitorReported` if the monitor flagged an error.
    pub async fn capture(&mut self) -> Result<Capture, CaptureError> {
        if self.target.input().is_none() {
            return Err(CaptureError::InputNotSet(self.target.path().to_path_buf()));
        }

        self.monitor.start()?;
        if let Err(e) = self.target.start() {
            if let Err(stop_err) = self.monitor.stop().await {
                warn!("Failed to stop monitor after target spawn failure: {stop_err}");
            }
            return Err(e);
        }

        let deadline = self.monitor.config().capture_deadline;
        let collected = self.monitor.collect(deadline).await;
        let stopped = self.target.stop().await;

        let trace = collected?;
        stopped?;
        Ok(trace.map_or(Capture::Miss, Capture::Trace))
    }
}
