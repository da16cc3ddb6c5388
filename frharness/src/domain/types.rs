//! Core domain types
//!
//! Newtypes for the values that tie the pipeline together: probes handed to
//! the monitor, and content hashes that key every session artifact.

use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::errors::ProbeError;

/// A single instrumentation point: a tag and a resolved virtual address.
///
/// Displayed (and parsed) in the monitor's `-p` format, `A:0x4010a0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Probe {
    tag: String,
    address: u64,
}

impl Probe {
    #[must_use]
    pub fn new(tag: impl Into<String>, address: u64) -> Self {
        Self { tag: tag.into(), address }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn address(&self) -> u64 {
        self.address
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{:x}", self.tag, self.address)
    }
}

impl FromStr for Probe {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, addr) =
            s.trim().split_once(':').ok_or_else(|| ProbeError::InvalidProbe(s.to_string()))?;
        if tag.is_empty() {
            return Err(ProbeError::InvalidProbe(s.to_string()));
        }
        let address =
            parse_hex_address(addr).ok_or_else(|| ProbeError::InvalidProbe(s.to_string()))?;
        Ok(Self::new(tag, address))
    }
}

/// Parse a hex address with or without a `0x` prefix.
#[must_use]
pub fn parse_hex_address(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// SHA-256 hex digest of an input string.
///
/// The join key between `01_METADATA`, `02_SESSION_INFO` and sample files.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    #[must_use]
    pub fn of(input: &str) -> Self {
        Self(hex::encode(Sha256::digest(input.as_bytes())))
    }

    /// Wrap a digest read back from a session file.
    #[must_use]
    pub fn from_hex(digest: &str) -> Self {
        Self(digest.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
