//! CLI argument definitions

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::discovery::DEFAULT_HIT_CEILING;
use crate::harness::{DEFAULT_SLOT, DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(
    name = "frharness",
    about = "Find Flush+Reload probe points and sample labelled timing traces",
    after_help = "\
EXAMPLES:
    frharness find-addr ./target --probes parse_html,get_html
    frharness find-probes ./target inputs.txt --take-top-n 10
    frharness gather-data ./target inputs.txt probes.txt 50 ./train
    frharness fix-missing ./target ./train/session_03 probes.txt"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Cmd,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Cmd {
    /// Resolve function names to tagged probe addresses
    FindAddr {
        /// Path to the target binary
        target_binary: PathBuf,

        /// Comma-separated function names (e.g. get_html,parse_html)
        #[arg(long, conflicts_with = "probe_file", required_unless_present = "probe_file")]
        probes: Option<String>,

        /// File with one function name per line
        #[arg(long)]
        probe_file: Option<PathBuf>,
    },

    /// Rank candidate addresses by how often they are hit across inputs
    FindProbes {
        /// Path to the target binary
        target_binary: PathBuf,

        /// File with one target input per line
        input_list: PathBuf,

        /// Candidate addresses, one per line (default: every .text symbol)
        #[arg(long)]
        probe_file: Option<PathBuf>,

        /// Treat --probe-file as a Ghidra symbol table CSV export
        #[arg(long)]
        ghidra_data: bool,

        /// Seconds each input runs under the debugger
        #[arg(long, default_value = "10")]
        sleep: u64,

        /// Hits after which a breakpoint disables itself
        #[arg(long, default_value_t = DEFAULT_HIT_CEILING)]
        check_num: u32,

        /// Addresses from each run that count towards the ranking
        #[arg(long, default_value = "10")]
        take_top_n: usize,

        /// Maximum number of inputs to run
        #[arg(long, default_value = "10")]
        max_inputs: usize,

        /// Runtime base of the PIE under the debugger (hex)
        #[arg(long, value_name = "HEX")]
        load_bias: Option<String>,

        /// Image base to subtract from raw candidate addresses (hex)
        #[arg(long, value_name = "HEX")]
        image_base: Option<String>,

        /// Directory for debugger scripts and transcripts (default: temporary)
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Write the ranking as JSON
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },

    /// Capture training traces into a new session
    GatherData {
        /// Path to the target binary
        target_binary: PathBuf,

        /// File with one target input per line
        input_list: PathBuf,

        /// Probe file, one `TAG:0xADDR` per line
        probe_file: PathBuf,

        /// Captures to attempt per input
        samples: u64,

        /// Campaign directory that holds the sessions
        train_dir: PathBuf,

        #[command(flatten)]
        monitor: MonitorArgs,

        /// Kill the monitor after N seconds without output
        #[arg(long, default_value = "10")]
        sleep_kill: u64,
    },

    /// Capture the samples a session is still missing
    FixMissing {
        /// Path to the target binary
        target_binary: PathBuf,

        /// Session directory to top up
        session_dir: PathBuf,

        /// Probe file, one `TAG:0xADDR` per line
        probe_file: PathBuf,

        /// Metadata ledger (default: <session_dir>/01_METADATA)
        #[arg(long)]
        meta_data: Option<PathBuf>,

        /// Progress ledger (default: <session_dir>/02_SESSION_INFO)
        #[arg(long)]
        session_data: Option<PathBuf>,

        #[command(flatten)]
        monitor: MonitorArgs,

        /// Kill the monitor after N seconds without output
        #[arg(long, default_value = "1")]
        sleep_kill: u64,
    },

    /// Calibrate the hit threshold from the monitor's cache benchmark
    Bench {
        /// Path to the monitor binary
        #[arg(long, default_value = "./spy")]
        spy_binary: PathBuf,

        /// Give up after N seconds
        #[arg(long, default_value = "60")]
        timeout: u64,
    },
}

#[derive(ClapArgs)]
pub struct MonitorArgs {
    /// Path to the monitor binary
    #[arg(long, default_value = "./spy")]
    pub spy_binary: PathBuf,

    /// Cycle count separating a cache hit from a miss
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: u32,

    /// Slot width; controls how long each trace is
    #[arg(long, default_value_t = DEFAULT_SLOT)]
    pub slot: u32,
}
