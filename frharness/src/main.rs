//! # frharness - Main Entry Point
//!
//! One subcommand per operator workflow:
//! - **find-addr**: print `TAG:0xADDR` probe lines for named functions
//! - **find-probes**: rank candidate addresses by hit frequency under gdb
//! - **gather-data**: capture labelled traces into a new session
//! - **fix-missing**: top up an existing session from its ledgers
//! - **bench**: calibrate the cache-hit threshold

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use frharness::campaign::{self, DiscoverySettings};
use frharness::cli::{Args, Cmd, MonitorArgs};
use frharness::discovery::{
    AddressTranslation, Debugger, DebuggerConfig, WorkDir, DEFAULT_LOAD_BIAS,
};
use frharness::domain::{parse_hex_address, CaptureError, Probe, ProbeError};
use frharness::harness::{CacheBench, Coordinator, MonitorConfig};
use frharness::preflight::{
    check_binary_exists, check_bounded, check_dir_exists, check_file_exists, check_positive,
    check_symbols,
};
use frharness::session::Session;
use frharness::symbolization::{
    extract_functions, get_probe_addresses, load_ghidra_functions, load_probe_file,
    GHIDRA_IMAGE_BASE, MAX_PROBE_TAGS,
};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let configuration = err.chain().any(|cause| {
        cause.downcast_ref::<ProbeError>().is_some_and(ProbeError::is_configuration)
            || cause.downcast_ref::<CaptureError>().is_some_and(CaptureError::is_configuration)
    });
    let msg = err.to_string().to_lowercase();
    if configuration
        || msg.contains("missing required")
        || msg.contains("invalid argument")
    {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;

    match args.command {
        Cmd::FindAddr { target_binary, probes, probe_file } => {
            find_addr(&target_binary, probes.as_deref(), probe_file.as_deref(), quiet)
        }
        Cmd::FindProbes {
            target_binary,
            input_list,
            probe_file,
            ghidra_data,
            sleep,
            check_num,
            take_top_n,
            max_inputs,
            load_bias,
            image_base,
            work_dir,
            export,
        } => {
            check_binary_exists(&target_binary, "target")?;
            check_file_exists(&input_list, "input list")?;
            check_bounded("--sleep", sleep)?;
            check_bounded("--check-num", u64::from(check_num))?;
            check_positive("--take-top-n", take_top_n as u64)?;
            check_positive("--max-inputs", max_inputs as u64)?;
            check_symbols(&target_binary, quiet)?;
            if ghidra_data && probe_file.is_none() {
                bail!("Missing required argument: --ghidra-data needs --probe-file <CSV>");
            }

            let load_bias =
                hex_flag("--load-bias", load_bias.as_deref())?.unwrap_or(DEFAULT_LOAD_BIAS);
            let image_base = hex_flag("--image-base", image_base.as_deref())?;

            // Ghidra addresses are rebased on import; raw files are rebased on translation.
            let (candidates, translation_base) = match probe_file {
                Some(path) if ghidra_data => {
                    check_file_exists(&path, "Ghidra CSV")?;
                    let base = image_base.unwrap_or(GHIDRA_IMAGE_BASE);
                    (load_ghidra_functions(&path, base)?, 0)
                }
                Some(path) => {
                    check_file_exists(&path, "probe file")?;
                    (load_candidates(&path)?, image_base.unwrap_or(0))
                }
                None => (extract_functions(&target_binary)?.addresses(), image_base.unwrap_or(0)),
            };
            if candidates.is_empty() {
                bail!("Invalid argument: no candidate addresses to probe");
            }

            // A scratch work dir lives until the end of this arm.
            let work_dir = WorkDir::create(work_dir).context("Failed to create work dir")?;

            let inputs = load_probe_file(&input_list)?;
            let mut config = DebuggerConfig::new(&target_binary, work_dir.path());
            config.translation = AddressTranslation { load_bias, image_base: translation_base };
            config.hit_ceiling = check_num;

            if !quiet {
                println!("frharness v{}", env!("CARGO_PKG_VERSION"));
                println!("Probing {} candidates over {} inputs", candidates.len(), inputs.len());
            }

            let mut debugger = Debugger::new(config);
            let settings = DiscoverySettings {
                sample_duration: Duration::from_secs(sleep),
                top_n: take_top_n,
                max_inputs,
            };
            let ranking =
                campaign::find_probes(&mut debugger, &candidates, &inputs, settings).await?;

            println!("Ranked probes ({} inputs):", ranking.inputs());
            for probe in ranking.ranked() {
                println!("  0x{:x}\t{}", probe.address, probe.frequency);
            }

            if let Some(path) = export {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                ranking.export_json(BufWriter::new(file))?;
                info!("Ranking exported to {}", path.display());
            }
            Ok(())
        }
        Cmd::GatherData {
            target_binary,
            input_list,
            probe_file,
            samples,
            train_dir,
            monitor,
            sleep_kill,
        } => {
            check_file_exists(&input_list, "input list")?;
            check_dir_exists(&train_dir, "train_dir")?;
            check_positive("samples", samples)?;
            let config = monitor_config(&target_binary, &probe_file, monitor, sleep_kill, quiet)?;
            let inputs = load_probe_file(&input_list)?;

            let mut coordinator = Coordinator::new(config);
            let summary =
                campaign::gather_data(&mut coordinator, &inputs, samples, &train_dir).await?;

            println!(
                "{}: {} inputs, {}/{} traces captured",
                summary.session.display(),
                summary.inputs,
                summary.captured,
                summary.attempted
            );
            Ok(())
        }
        Cmd::FixMissing {
            target_binary,
            session_dir,
            probe_file,
            meta_data,
            session_data,
            monitor,
            sleep_kill,
        } => {
            check_dir_exists(&session_dir, "session_dir")?;
            let session = Session::open(&session_dir);
            let metadata = meta_data.unwrap_or_else(|| session.metadata_path());
            let session_info = session_data.unwrap_or_else(|| session.session_info_path());
            check_file_exists(&metadata, "metadata ledger")?;
            check_file_exists(&session_info, "session info ledger")?;
            let config = monitor_config(&target_binary, &probe_file, monitor, sleep_kill, quiet)?;

            let mut coordinator = Coordinator::new(config);
            let summary =
                campaign::fix_missing(&mut coordinator, &session, &metadata, &session_info).await?;

            println!(
                "{}: {} inputs, {}/{} missing traces recovered",
                session.path().display(),
                summary.inputs,
                summary.captured,
                summary.attempted
            );
            Ok(())
        }
        Cmd::Bench { spy_binary, timeout } => {
            check_binary_exists(&spy_binary, "monitor")?;
            check_positive("--timeout", timeout)?;

            let report = CacheBench::new(&spy_binary).run(Duration::from_secs(timeout)).await?;
            for (label, summary) in [("L1 hit", report.l1), ("Memory load", report.memory)] {
                match summary {
                    Some(s) => println!(
                        "{label:<12} n={:<6} min={:<5} median={:<5} max={:<5} mean={:.1}",
                        s.count, s.min, s.median, s.max, s.mean
                    ),
                    None => println!("{label:<12} no samples"),
                }
            }
            match report.suggested_threshold() {
                Some(threshold) => println!("Suggested --threshold {threshold}"),
                None => println!("Not enough samples to suggest a threshold"),
            }
            Ok(())
        }
    }
}

/// Print `TAG:0xADDR` lines for the requested function names.
fn find_addr(
    target: &Path,
    probes: Option<&str>,
    probe_file: Option<&Path>,
    quiet: bool,
) -> Result<()> {
    check_binary_exists(target, "target")?;
    check_symbols(target, quiet)?;

    let names: Vec<String> = match (probes, probe_file) {
        (Some(list), _) => {
            list.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
        }
        (None, Some(path)) => {
            check_file_exists(path, "probe file")?;
            load_probe_file(path)?
        }
        (None, None) => bail!("Missing required argument: --probes or --probe-file"),
    };

    for probe in get_probe_addresses(target, &names)? {
        println!("{probe}");
    }
    Ok(())
}

fn monitor_config(
    target: &Path,
    probe_file: &Path,
    monitor: MonitorArgs,
    sleep_kill: u64,
    quiet: bool,
) -> Result<MonitorConfig> {
    check_binary_exists(target, "target")?;
    check_binary_exists(&monitor.spy_binary, "monitor")?;
    check_file_exists(probe_file, "probe file")?;
    check_positive("--threshold", u64::from(monitor.threshold))?;
    check_positive("--slot", u64::from(monitor.slot))?;
    check_positive("--sleep-kill", sleep_kill)?;
    check_symbols(target, quiet)?;

    let probes = load_probe_file(probe_file)?
        .iter()
        .map(|line| line.parse::<Probe>())
        .collect::<Result<Vec<_>, _>>()?;
    if probes.is_empty() {
        bail!("Invalid argument: {} contains no probes", probe_file.display());
    }
    if probes.len() > MAX_PROBE_TAGS {
        let requested = probes.len();
        return Err(ProbeError::TooManyProbes { requested, max: MAX_PROBE_TAGS }.into());
    }

    Ok(MonitorConfig {
        monitor: monitor.spy_binary,
        target: target.to_path_buf(),
        threshold: monitor.threshold,
        slot: monitor.slot,
        probes,
        capture_deadline: Duration::from_secs(sleep_kill),
    })
}

/// One hex address per line.
fn load_candidates(path: &Path) -> Result<Vec<u64>> {
    load_probe_file(path)?
        .iter()
        .map(|line| {
            parse_hex_address(line)
                .with_context(|| {
                    format!("Invalid argument: bad address {line:?} in {}", path.display())
                })
        })
        .collect()
}

fn hex_flag(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    value
        .map(|v| {
            parse_hex_address(v)
                .with_context(|| format!("Invalid argument: {name} expects hex, got {v:?}"))
        })
        .transpose()
}
