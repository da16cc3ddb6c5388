//! # Symbol Resolution
//!
//! Turns a target binary into addresses the rest of the pipeline can probe.
//!
//! ## Sources of candidate addresses
//!
//! - **`symbol_table`**: `objdump -t --demangle` restricted to `.text`.
//!   Used two ways:
//!   - `get_probe_addresses` maps a short list of function names (at most
//!     26) to tagged probes in the monitor's `A:0x4010a0` format
//!   - `extract_functions` returns the whole table as a discovery pool
//!
//! - **`ghidra`**: a Ghidra symbol-table CSV export. Ghidra uses its own
//!   image base, so locations are rebased on import and allocator-family
//!   symbols are dropped.
//!
//! ## Static vs. runtime addresses
//!
//! Everything returned here is a **static** address as laid out in the ELF
//! file. Translating to the runtime addresses a debugger sees is the job of
//! [`crate::discovery::translation`]:
//!
//! ```text
//! Runtime Address = Static Address - Image Base + Load Bias
//! ```
//!
//! ## Limitations
//!
//! - **Requires a symbol table**: a stripped binary yields an empty table
//! - **Duplicate names**: the last listing line for a name wins

pub mod ghidra;
pub mod symbol_table;

pub use ghidra::{load_ghidra_functions, GHIDRA_IMAGE_BASE};
pub use symbol_table::{
    extract_functions, get_probe_addresses, load_probe_file, resolve, SymbolTable,
    MAX_PROBE_TAGS,
};
