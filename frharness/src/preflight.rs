//! Pre-flight checks for frharness
//!
//! Validates every precondition before a process is spawned or a session is
//! allocated. Provides clear, actionable error messages when requirements
//! aren't met.

use anyhow::{bail, Context, Result};
use object::{Object, ObjectSection};
use std::path::Path;

/// Upper bound for discovery sleep and hit-count settings.
pub const MAX_DISCOVERY_SETTING: u64 = 100_000;

/// Check that a binary exists and is a regular file
pub fn check_binary_exists(path: &Path, role: &str) -> Result<()> {
    if !path.exists() {
        bail!(
            "Missing required file: {role} binary not found at {}\n\n\
             Make sure the path is correct and the binary exists.",
            path.display()
        );
    }
    if !path.is_file() {
        bail!(
            "Invalid argument: {role} must point to an executable file, not a directory: {}",
            path.display()
        );
    }
    Ok(())
}

/// Check that an input file exists
pub fn check_file_exists(path: &Path, role: &str) -> Result<()> {
    if !path.is_file() {
        bail!("Missing required file: {role} not found at {}", path.display());
    }
    Ok(())
}

pub fn check_dir_exists(path: &Path, role: &str) -> Result<()> {
    if !path.is_dir() {
        bail!("Missing required directory: {role} not found at {}", path.display());
    }
    Ok(())
}

pub fn check_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        bail!("Invalid argument: {name} must be greater than zero");
    }
    Ok(())
}

/// Check `0 < value < MAX_DISCOVERY_SETTING`
pub fn check_bounded(name: &str, value: u64) -> Result<()> {
    if value == 0 || value >= MAX_DISCOVERY_SETTING {
        bail!(
            "Invalid argument: {name} must be greater than 0 and less than {MAX_DISCOVERY_SETTING}"
        );
    }
    Ok(())
}

/// Warn if the target has no symbol table; symbol resolution will find nothing.
pub fn check_symbols(target_path: &Path, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let file_data = std::fs::read(target_path)
        .with_context(|| format!("Failed to read binary: {}", target_path.display()))?;

    let Ok(obj) = object::File::parse(&*file_data) else {
        // Not a valid object file, let later stages handle it
        return Ok(());
    };

    let has_symtab = obj.section_by_name(".symtab").is_some_and(|s| s.size() > 0);
    if !has_symtab {
        eprintln!("warning: binary stripped, no function names can be resolved");
    }

    Ok(())
}
