//! Probe discovery
//!
//! Finds code addresses worth monitoring by running the target under gdb
//! with a breakpoint on every candidate and counting which ones fire:
//! - Translation between static (ELF) and runtime (gdb) addresses
//! - Batch script generation
//! - Debugger session lifecycle and transcript parsing
//! - Cross-input ranking

pub mod debugger;
pub mod ranking;
pub mod script;
pub mod translation;

pub use debugger::{Debugger, DebuggerConfig, DiscoveryPhase, WorkDir};
pub use ranking::{aggregate_hits, HitRecord, ProbeRanking, RankedProbe};
pub use script::{DebuggerScript, DEFAULT_HIT_CEILING};
pub use translation::{AddressTranslation, TextBounds, DEFAULT_LOAD_BIAS};
