//! gdb session driver for probe discovery
//!
//! One `Debugger` serves one discovery session. Phases advance as
//! `Idle → TextBoundsLoaded → ScriptBuilt → Running → Collected`; after
//! `Collected` the same script is rerun for the next input.

use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};

use super::ranking::{aggregate_hits, HitRecord};
use super::script::{DebuggerScript, DEFAULT_HIT_CEILING};
use super::translation::{parse_text_bounds, AddressTranslation, TextBounds};
use crate::domain::{parse_hex_address, DiscoveryError};

pub const DEFAULT_DEBUGGER: &str = "gdb";

const SCRIPT_FILE: &str = "script.gdb";
const SECTIONS_FILE: &str = "sections.gdb";
const TRANSCRIPT_FILE: &str = "gdb_output";

/// Upper bound on the `starti` / `info file` run.
const BOUNDS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DebuggerConfig {
    pub debugger: PathBuf,
    pub target: PathBuf,
    /// Directory for the generated scripts and the transcript.
    pub work_dir: PathBuf,
    pub translation: AddressTranslation,
    pub hit_ceiling: u32,
}

impl DebuggerConfig {
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            debugger: PathBuf::from(DEFAULT_DEBUGGER),
            target: target.into(),
            work_dir: work_dir.into(),
            translation: AddressTranslation::default(),
            hit_ceiling: DEFAULT_HIT_CEILING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    Idle,
    TextBoundsLoaded,
    ScriptBuilt,
    Running,
    Collected,
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::TextBoundsLoaded => "text-bounds-loaded",
            Self::ScriptBuilt => "script-built",
            Self::Running => "running",
            Self::Collected => "collected",
        };
        f.write_str(name)
    }
}

pub struct Debugger {
    config: DebuggerConfig,
    phase: DiscoveryPhase,
    text_bounds: Option<TextBounds>,
    script: Option<DebuggerScript>,
    child: Option<Child>,
}

impl Debugger {
    #[must_use]
    pub fn new(config: DebuggerConfig) -> Self {
        Self { config, phase: DiscoveryPhase::Idle, text_bounds: None, script: None, child: None }
    }

    #[must_use]
    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    #[must_use]
    pub fn text_bounds(&self) -> Option<TextBounds> {
        self.text_bounds
    }

    #[must_use]
    pub fn script(&self) -> Option<&DebuggerScript> {
        self.script.as_ref()
    }

    #[must_use]
    pub fn transcript_path(&self) -> PathBuf {
        self.config.work_dir.join(TRANSCRIPT_FILE)
    }

    /// Read the runtime `.text` bounds with a breakpoint-free `starti` run.
    ///
    /// # Errors
    /// `Spawn` if gdb cannot be started, `MissingTextSection` if the report
    /// has no `.text` line (the session stays `Idle` and accepts every
    /// candidate later).
    pub async fn load_text_section_bounds(&mut self) -> Result<TextBounds, DiscoveryError> {
        self.expect_phase("load text bounds", &[DiscoveryPhase::Idle])?;

        let transcript = self.transcript_path();
        let script_path = self.config.work_dir.join(SECTIONS_FILE);
        DebuggerScript::text_section_probe(&transcript).write(&script_path)?;
        remove_if_exists(&transcript)?;

        let mut child = self.spawn(&script_path, None)?;
        if tokio::time::timeout(BOUNDS_TIMEOUT, child.wait()).await.is_err() {
            warn!("Debugger did not finish the section report in {BOUNDS_TIMEOUT:?}, killing it");
            child.kill().await?;
        }

        let report = match fs::read_to_string(&transcript) {
            Ok(report) => report,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let bounds = parse_text_bounds(&report)
            .ok_or_else(|| DiscoveryError::MissingTextSection(self.config.target.clone()))?;

        self.text_bounds = Some(bounds);
        self.phase = DiscoveryPhase::TextBoundsLoaded;
        Ok(bounds)
    }

    /// Generate and write the breakpoint script. The script is fixed for the
    /// rest of the session. Returns the number of breakpoints set.
    ///
    /// # Errors
    /// `InvalidState` if a script was already built; `Io` if it cannot be written.
    pub fn build_script(&mut self, candidates: &[u64]) -> Result<usize, DiscoveryError> {
        self.expect_phase(
            "build script",
            &[DiscoveryPhase::Idle, DiscoveryPhase::TextBoundsLoaded],
        )?;

        let mut script = DebuggerScript::new(&self.transcript_path());
        let accepted = script.set_breakpoints(
            candidates,
            &self.config.translation,
            self.text_bounds.as_ref(),
        );
        if accepted < candidates.len() {
            let total = candidates.len();
            info!("{} of {} candidates outside .text", total - accepted, total);
        }
        if accepted == 0 {
            warn!("No breakpoints set; every run will report zero hits");
        }
        script.set_command_pc();
        script.enable_count(self.config.hit_ceiling);
        script.push_command("run");
        script.write(&self.config.work_dir.join(SCRIPT_FILE))?;

        self.script = Some(script);
        self.phase = DiscoveryPhase::ScriptBuilt;
        Ok(accepted)
    }

    /// Launch the target under gdb with `input` as its only argument and let
    /// it run for `sample_duration`.
    ///
    /// The window is wall-clock time, not program completion: a slow input
    /// may be cut short and a fast one idles out the remainder.
    ///
    /// # Errors
    /// `InvalidState` before a script exists or while a run is active;
    /// `Spawn` if gdb cannot be started.
    pub async fn run(
        &mut self,
        input: &str,
        sample_duration: Duration,
    ) -> Result<(), DiscoveryError> {
        self.expect_phase("run", &[DiscoveryPhase::ScriptBuilt, DiscoveryPhase::Collected])?;

        remove_if_exists(&self.transcript_path())?;
        let script_path = self.config.work_dir.join(SCRIPT_FILE);
        let child = self.spawn(&script_path, Some(input))?;
        self.child = Some(child);
        self.phase = DiscoveryPhase::Running;

        debug!("Sampling {input} for {sample_duration:?}");
        tokio::time::sleep(sample_duration).await;
        Ok(())
    }

    /// Kill the gdb session regardless of the target's state.
    ///
    /// # Errors
    /// Returns an error if the process cannot be reaped.
    pub async fn stop(&mut self) -> Result<(), DiscoveryError> {
        let Some(mut child) = self.child.take() else {
            warn!("Debugger is not running. Doing nothing.");
            return Ok(());
        };
        if let Err(e) = child.start_kill() {
            debug!("Debugger already exited: {e}");
        }
        child.wait().await?;
        Ok(())
    }

    /// Collect `$pc` values from the transcript, translated back to static
    /// addresses, sorted ascending by count. A missing transcript means no hits.
    ///
    /// # Errors
    /// `InvalidState` unless a run has been stopped; `Io` on read failure.
    pub fn parse_hits(&mut self) -> Result<Vec<HitRecord>, DiscoveryError> {
        self.expect_phase("parse hits", &[DiscoveryPhase::Running])?;
        if self.child.is_some() {
            return Err(DiscoveryError::InvalidState {
                operation: "parse hits",
                phase: "running (not stopped)".to_string(),
            });
        }

        let transcript = match fs::read_to_string(self.transcript_path()) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let translation = self.config.translation;
        let hits = aggregate_hits(
            pc_values(&transcript).filter_map(|runtime| translation.to_static(runtime)),
        );

        self.phase = DiscoveryPhase::Collected;
        Ok(hits)
    }

    /// `run`, `stop` and `parse_hits` for one input.
    ///
    /// # Errors
    /// See the individual operations.
    pub async fn sample(
        &mut self,
        input: &str,
        sample_duration: Duration,
    ) -> Result<Vec<HitRecord>, DiscoveryError> {
        self.run(input, sample_duration).await?;
        self.stop().await?;
        self.parse_hits()
    }

    fn expect_phase(
        &self,
        operation: &'static str,
        allowed: &[DiscoveryPhase],
    ) -> Result<(), DiscoveryError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(DiscoveryError::InvalidState { operation, phase: self.phase.to_string() })
        }
    }

    fn spawn(&self, script: &Path, input: Option<&str>) -> Result<Child, DiscoveryError> {
        let mut cmd = Command::new(&self.config.debugger);
        cmd.arg("--batch").arg(format!("--command={}", script.display()));
        match input {
            Some(input) => {
                cmd.arg("--args").arg(&self.config.target).arg(input);
            }
            None => {
                cmd.arg(&self.config.target);
            }
        }
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);

        cmd.spawn().map_err(|source| DiscoveryError::Spawn {
            program: self.config.debugger.display().to_string(),
            source,
        })
    }
}

/// Instruction pointer values printed by `info reg $pc`.
///
/// gdb prints `pc             0x555555555139      0x555555555139 <main+4>`
/// (or `rip` on some targets).
fn pc_values(transcript: &str) -> impl Iterator<Item = u64> + '_ {
    transcript.lines().filter_map(|line| {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("pc" | "rip") => parts.next().and_then(parse_hex_address),
            _ => None,
        }
    })
}

/// Where scripts and transcripts live for one discovery session.
///
/// A directory chosen by the operator is kept; a scratch directory is
/// removed when this is dropped.
#[derive(Debug)]
pub enum WorkDir {
    Given(PathBuf),
    Scratch(tempfile::TempDir),
}

impl WorkDir {
    /// Use `explicit` (created if missing) or a fresh `frharness-*` temp dir.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn create(explicit: Option<PathBuf>) -> io::Result<Self> {
        match explicit {
            Some(dir) => {
                fs::create_dir_all(&dir)?;
                Ok(Self::Given(dir))
            }
            None => Ok(Self::Scratch(tempfile::Builder::new().prefix("frharness-").tempdir()?)),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Given(dir) => dir,
            Self::Scratch(dir) => dir.path(),
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
