//! Target process: `<target> <input>`

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::domain::CaptureError;

pub struct TargetProcess {
    target: PathBuf,
    input: Option<String>,
    child: Option<Child>,
    terminations: u64,
}

impl TargetProcess {
    #[must_use]
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self { target: target.into(), input: None, child: None, terminations: 0 }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.target
    }

    /// Input passed as the target's sole argument on the next start.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = Some(input.into());
    }

    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Number of times a running target has been torn down.
    #[must_use]
    pub fn terminations(&self) -> u64 {
        self.terminations
    }

    /// Start the target. Starting an already running target is a no-op.
    ///
    /// # Errors
    /// `InputNotSet` before [`Self::set_input`]; `Spawn` if the binary cannot run.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.child.is_some() {
            warn!("Target process exists already. Doing nothing.");
            return Ok(());
        }
        let input =
            self.input.as_deref().ok_or_else(|| CaptureError::InputNotSet(self.target.clone()))?;

        // Output is discarded: an unread pipe would stall a chatty target.
        let child = Command::new(&self.target)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CaptureError::Spawn {
                program: self.target.display().to_string(),
                source,
            })?;

        self.child = Some(child);
        Ok(())
    }

    /// Kill the target and reap it. A target that already exited is only reaped.
    ///
    /// # Errors
    /// Returns an error if the process cannot be reaped.
    pub async fn stop(&mut self) -> Result<(), CaptureError> {
        let Some(mut child) = self.child.take() else {
            warn!("Target process does not exist. Doing nothing.");
            return Ok(());
        };
        if let Err(e) = child.start_kill() {
            debug!("Target already gone: {e}");
        }
        child.wait().await?;
        self.terminations += 1;
        Ok(())
    }
}
