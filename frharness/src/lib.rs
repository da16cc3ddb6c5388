//! # frharness - Flush+Reload Data Collection Harness
//!
//! frharness drives a cache side-channel monitor against a victim program to
//! build labelled timing-trace datasets. It picks the code addresses worth
//! monitoring, runs monitor and target as a coordinated pair once per sample,
//! and files every trace in a content-addressed session directory that can be
//! resumed after partial failure.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │   Target Binary      │        │  Ghidra CSV export   │
//! │  (objdump symbols)   │        │  (optional)          │
//! └──────────┬───────────┘        └──────────┬───────────┘
//!            │ names / candidates            │ candidates
//!            ▼                               ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  symbolization ──▶ discovery (gdb batch scripts)        │
//! │                     │ hit counts                        │
//! │                     ▼                                   │
//! │               ProbeRanking ──▶ probe file (TAG:0xADDR)  │
//! └────────────────────────────┬────────────────────────────┘
//!                              │ probes
//!                              ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │  harness: monitor ◀──▶ target   (one pair per sample)   │
//! │                │ trace                                  │
//! │                ▼                                        │
//! │  session: 01_METADATA, 02_SESSION_INFO, <hash>_<n>      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`symbolization`]: function name → static address, probe tagging,
//!   Ghidra symbol-table import
//! - [`discovery`]: debugger script generation, load-bias translation,
//!   transcript parsing and cross-input ranking
//! - [`harness`]: monitor/target process pair, output classification and
//!   cache calibration
//! - [`session`]: session allocation, append-only ledgers, gap-fill planning
//! - [`campaign`]: the `find_probes`, `gather_data` and `fix_missing` loops
//! - [`cli`]: command-line argument parsing
//! - [`domain`]: probes, content hashes and error types
//!
//! ## Typical Usage
//!
//! ```bash
//! # Resolve two functions to monitor
//! frharness find-addr ./victim --probes parse_html,get_html > probes.txt
//!
//! # Collect 50 traces per input into ./train/session_NN
//! frharness gather-data ./victim urls.txt probes.txt 50 ./train --spy-binary ./spy
//!
//! # Top up whatever that session missed
//! frharness fix-missing ./victim ./train/session_01 probes.txt --spy-binary ./spy
//! ```
//!
//! ## Key Concepts
//!
//! - **Probe**: a tagged code address (`A:0x4010a0`) the monitor watches
//! - **Load bias**: fixed base gdb maps a PIE at; breakpoints use runtime
//!   addresses, rankings use static ones
//! - **Miss**: a capture attempt in which the monitor produced no trace
//!   before its deadline

pub mod campaign;
pub mod cli;
pub mod discovery;
pub mod domain;
pub mod harness;
pub mod host_info;
pub mod preflight;
pub mod session;
pub mod symbolization;
