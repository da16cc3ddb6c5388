//! Campaign drivers
//!
//! The three long-running workflows, each a single control loop over its
//! inputs:
//! - [`find_probes`]: rank candidate addresses with the debugger
//! - [`gather_data`]: capture `samples` traces per input into a new session
//! - [`fix_missing`]: top up a session from its own ledgers

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discovery::{Debugger, ProbeRanking};
use crate::domain::{ContentHash, DiscoveryError};
use crate::harness::{Capture, Coordinator};
use crate::host_info;
use crate::session::{allocate_session, plan_gap_fill, Session};

#[derive(Debug, Clone, Copy)]
pub struct DiscoverySettings {
    /// Wall-clock window each input runs under the debugger.
    pub sample_duration: Duration,
    /// Addresses from each run that earn a vote.
    pub top_n: usize,
    pub max_inputs: usize,
}

/// Rank `candidates` by how reproducibly they are hit across `inputs`.
///
/// # Errors
/// Fails if the debugger cannot be spawned or its files cannot be written.
/// An input that produces no hits is not an error.
pub async fn find_probes(
    debugger: &mut Debugger,
    candidates: &[u64],
    inputs: &[String],
    settings: DiscoverySettings,
) -> Result<ProbeRanking> {
    match debugger.load_text_section_bounds().await {
        Ok(_) => {}
        Err(DiscoveryError::MissingTextSection(target)) => {
            warn!("No .text bounds for {}; keeping every candidate", target.display());
        }
        Err(e) => return Err(e).context("Failed to read .text bounds"),
    }

    let accepted = debugger.build_script(candidates)?;
    info!("Set {accepted} breakpoints");

    let mut ranking = ProbeRanking::new();
    let total = inputs.len().min(settings.max_inputs);

    for (index, input) in inputs.iter().take(settings.max_inputs).enumerate() {
        info!("Discovery[{}/{}]: {}", index + 1, total, input);

        let hits = debugger
            .sample(input, settings.sample_duration)
            .await
            .with_context(|| format!("Debugger run failed for {input}"))?;
        if hits.is_empty() {
            info!("No breakpoint hits for {input}");
        }
        ranking.record_top(&hits, settings.top_n);
    }

    Ok(ranking)
}

#[derive(Debug, Clone)]
pub struct GatherSummary {
    pub session: PathBuf,
    pub inputs: usize,
    pub captured: u64,
    pub attempted: u64,
}

/// Capture `samples` traces for every input into a freshly allocated session.
///
/// # Errors
/// Fails on session I/O errors and fatal capture errors (spawn failures).
/// Misses and monitor-reported errors only cost the affected attempt.
pub async fn gather_data(
    coordinator: &mut Coordinator,
    inputs: &[String],
    samples: u64,
    campaign_dir: &Path,
) -> Result<GatherSummary> {
    let session = allocate_session(campaign_dir).context("Failed to allocate session")?;

    let snapshot = host_info::cpu_info().unwrap_or_else(|e| {
        warn!("CPU info unavailable: {e}");
        String::new()
    });
    session.write_cpu_info(&snapshot)?;

    let mut summary = GatherSummary {
        session: session.path().to_path_buf(),
        inputs: inputs.len(),
        captured: 0,
        attempted: 0,
    };

    for (index, input) in inputs.iter().enumerate() {
        info!("Sampling[{}/{}]: {}", index + 1, inputs.len(), input);

        let hash = session.record_attempt_start(input)?;
        coordinator.set_input(input.as_str());
        let mut successes = 0;
        let outcome = run_captures(coordinator, &session, &hash, samples, &mut successes).await;

        // The progress line is closed on every path, aborted or not.
        let recorded = session.record_outcome(successes, samples, &current_load());
        outcome.with_context(|| format!("Sampling aborted for {input}"))?;
        recorded?;
        summary.captured += successes;
        summary.attempted += samples;
    }

    Ok(summary)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FillSummary {
    pub inputs: usize,
    pub captured: u64,
    pub attempted: u64,
}

/// Re-run the captures a session is still missing.
///
/// New traces continue each input's index sequence; the ledgers themselves
/// are not modified. Run only while no other writer uses the session.
///
/// # Errors
/// Fails if the ledgers cannot be read or parsed, on sample write errors and
/// on fatal capture errors.
pub async fn fix_missing(
    coordinator: &mut Coordinator,
    session: &Session,
    metadata_file: &Path,
    session_info_file: &Path,
) -> Result<FillSummary> {
    let plan = plan_gap_fill(metadata_file, session_info_file)
        .context("Failed to plan gap fill from session ledgers")?;
    let mut summary = FillSummary { inputs: plan.len(), ..FillSummary::default() };

    for gap in &plan {
        info!("{}: {}", gap.input, gap.missing);

        coordinator.set_input(gap.input.as_str());
        let mut successes = 0;
        run_captures(coordinator, session, &gap.hash, gap.missing, &mut successes).await?;

        info!("[{}/{}] : {}", successes, gap.missing, current_load());
        summary.captured += successes;
        summary.attempted += gap.missing;
    }

    Ok(summary)
}

/// Run `count` captures for the coordinator's current input, storing each
/// trace. `successes` counts stored traces and stays valid on error.
async fn run_captures(
    coordinator: &mut Coordinator,
    session: &Session,
    hash: &ContentHash,
    count: u64,
    successes: &mut u64,
) -> Result<()> {
    for attempt in 0..count {
        debug!("\t{}", attempt + 1);

        match coordinator.capture().await {
            Ok(Capture::Trace(trace)) => {
                session.record_sample(hash, &trace)?;
                *successes += 1;
            }
            Ok(Capture::Miss) => {
                warn!("Missed: {}", coordinator.target().input().unwrap_or_default());
            }
            Err(e) if !e.is_fatal() => error!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn current_load() -> String {
    host_info::system_load().unwrap_or_else(|e| {
        warn!("Load average unavailable: {e}");
        "unknown".to_string()
    })
}
