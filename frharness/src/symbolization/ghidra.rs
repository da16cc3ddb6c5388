//! Candidate import from a Ghidra symbol-table CSV export
//!
//! Ghidra loads images at its own base (0x100000 for ELF by default), so
//! every exported location is rebased before it joins the candidate pool.

use log::debug;
use std::fs;
use std::path::Path;

use crate::domain::{parse_hex_address, ProbeError};

/// Image base Ghidra assigns to imported ELF files.
pub const GHIDRA_IMAGE_BASE: u64 = 0x10_0000;

/// Allocator-family symbols excluded from the candidate pool.
pub const IGNORED_SYMBOLS: &[&str] = &["strndup", "calloc", "malloc", "realloc", "free"];

const FUNCTION_TYPE: &str = "Function";

/// Load candidate addresses from a Ghidra CSV export.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn load_ghidra_functions(csv_path: &Path, image_base: u64) -> Result<Vec<u64>, ProbeError> {
    let content = fs::read_to_string(csv_path)?;
    Ok(parse_ghidra_csv(&content, image_base))
}

/// Parse the export body. Rows need a `Function` field and a hex location in
/// the second column; duplicates keep their first position.
#[must_use]
pub fn parse_ghidra_csv(content: &str, image_base: u64) -> Vec<u64> {
    let mut probes = Vec::new();

    for line in content.lines() {
        let row = split_csv_row(line);
        if !row.iter().any(|field| field == FUNCTION_TYPE) {
            continue;
        }
        if let Some(name) = row.iter().find(|field| IGNORED_SYMBOLS.contains(&field.as_str())) {
            debug!("Skipping allocator symbol {name}");
            continue;
        }
        let Some(location) = row.get(1).and_then(|loc| parse_hex_address(loc)) else {
            continue;
        };
        let Some(addr) = location.checked_sub(image_base) else {
            debug!("Location 0x{location:x} lies below image base 0x{image_base:x}");
            continue;
        };
        if !probes.contains(&addr) {
            probes.push(addr);
        }
    }

    probes
}

/// Split one CSV row, honouring double-quoted fields.
fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
