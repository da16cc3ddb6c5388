//! Function name → address table built from a binary's code section
//!
//! The table is read from `objdump -t --demangle`, restricted to symbols that
//! live in `.text`. Each listing line is split on whitespace: the first token
//! is the address, the last token is the symbol name.

use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;

use crate::domain::{parse_hex_address, Probe, ProbeError};

/// Tags are drawn from `A..=Z`, which bounds a probe set.
pub const MAX_PROBE_TAGS: usize = 26;

/// Executable code section the resolver restricts itself to.
pub const TEXT_SECTION: &str = ".text";

const OBJDUMP: &str = "objdump";

/// Mapping from function name to its address string (leading zeros stripped).
///
/// When a name appears more than once in the listing the last occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, String>,
}

impl SymbolTable {
    /// Parse a symbol listing. Lines without tokens are skipped.
    #[must_use]
    pub fn parse_listing(listing: &str) -> Self {
        let mut entries = HashMap::new();

        for line in listing.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            let (Some(addr), Some(name)) = (parts.first(), parts.last()) else {
                continue;
            };
            entries.insert((*name).to_string(), strip_leading_zeros(addr));
        }

        Self { entries }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Candidate addresses for probe discovery, sorted ascending.
    #[must_use]
    pub fn addresses(&self) -> Vec<u64> {
        let mut addrs: Vec<u64> =
            self.entries.values().filter_map(|a| parse_hex_address(a)).collect();
        addrs.sort_unstable();
        addrs.dedup();
        addrs
    }

    /// Tag each requested name with `A`, `B`, ... in request order.
    ///
    /// # Errors
    /// `TooManyProbes` if more names than tags are requested (checked before
    /// any lookup), `SymbolNotFound` for the first missing name.
    pub fn probe_addresses<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Probe>, ProbeError> {
        check_probe_count(names.len())?;

        names
            .iter()
            .zip('A'..='Z')
            .map(|(name, tag)| {
                let name = name.as_ref();
                let addr =
                    self.get(name).ok_or_else(|| ProbeError::SymbolNotFound(name.to_string()))?;
                let address = parse_hex_address(addr)
                    .ok_or_else(|| ProbeError::InvalidProbe(format!("{name}: {addr}")))?;
                Ok(Probe::new(tag.to_string(), address))
            })
            .collect()
    }
}

fn check_probe_count(requested: usize) -> Result<(), ProbeError> {
    if requested > MAX_PROBE_TAGS {
        return Err(ProbeError::TooManyProbes { requested, max: MAX_PROBE_TAGS });
    }
    Ok(())
}

fn strip_leading_zeros(addr: &str) -> String {
    let stripped = addr.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Keep only the listing lines that belong to `section`.
#[must_use]
pub fn section_listing(listing: &str, section: &str) -> String {
    listing
        .lines()
        .filter(|line| line.split_whitespace().any(|tok| tok == section))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the symbol table for `binary_path`.
///
/// A binary without a code section in its symbol listing (e.g. stripped)
/// yields an empty table rather than an error.
///
/// # Errors
/// Returns an error if `objdump` cannot be run or rejects the file.
pub fn resolve(binary_path: &Path) -> Result<SymbolTable, ProbeError> {
    let output = Command::new(OBJDUMP)
        .arg("-t")
        .arg("--demangle")
        .arg(binary_path)
        .output()
        .map_err(|e| ProbeError::ToolFailed { tool: OBJDUMP.to_string(), error: e.to_string() })?;

    if !output.status.success() {
        return Err(ProbeError::ToolFailed {
            tool: OBJDUMP.to_string(),
            error: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let listing = String::from_utf8_lossy(&output.stdout);
    let table = SymbolTable::parse_listing(&section_listing(&listing, TEXT_SECTION));
    if table.is_empty() {
        warn!("No {TEXT_SECTION} symbols found in {}", binary_path.display());
    } else {
        debug!("Resolved {} symbols from {}", table.len(), binary_path.display());
    }
    Ok(table)
}

/// Resolve `names` in `binary_path` to tagged probes, preserving request order.
///
/// # Errors
/// `TooManyProbes` before the binary is even read; `SymbolNotFound` if a
/// name is absent; tool errors from [`resolve`].
pub fn get_probe_addresses<S: AsRef<str>>(
    binary_path: &Path,
    names: &[S],
) -> Result<Vec<Probe>, ProbeError> {
    check_probe_count(names.len())?;
    resolve(binary_path)?.probe_addresses(names)
}

/// Full name → address table, used as the candidate pool for discovery.
///
/// # Errors
/// See [`resolve`].
pub fn extract_functions(binary_path: &Path) -> Result<SymbolTable, ProbeError> {
    resolve(binary_path)
}

/// Read a list file, one entry per line, dropping blank lines.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn load_probe_file(path: &Path) -> Result<Vec<String>, ProbeError> {
    let content = fs::read_to_string(path)?;
    Ok(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect())
}
