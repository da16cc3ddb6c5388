//! Static ↔ runtime address translation
//!
//! A debugger launching a fresh PIE maps it at a fixed base (ASLR is off
//! under gdb), so a static address from the symbol table becomes
//! `static - image_base + load_bias` at runtime. `image_base` is non-zero
//! only when candidates come straight from a disassembler that uses its own
//! base and were not rebased on import.

use log::{info, warn};

/// Base gdb maps a freshly started x86-64 PIE at.
pub const DEFAULT_LOAD_BIAS: u64 = 0x5555_5555_4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressTranslation {
    pub load_bias: u64,
    pub image_base: u64,
}

impl Default for AddressTranslation {
    fn default() -> Self {
        Self { load_bias: DEFAULT_LOAD_BIAS, image_base: 0 }
    }
}

impl AddressTranslation {
    /// `None` when the address lies below the image base or overflows.
    #[must_use]
    pub fn to_runtime(&self, static_addr: u64) -> Option<u64> {
        static_addr.checked_sub(self.image_base)?.checked_add(self.load_bias)
    }

    /// Inverse of [`Self::to_runtime`]; `None` for addresses below the load bias
    /// (e.g. shared-library code).
    #[must_use]
    pub fn to_static(&self, runtime_addr: u64) -> Option<u64> {
        runtime_addr.checked_sub(self.load_bias)?.checked_add(self.image_base)
    }
}

/// Runtime bounds of the target's `.text` section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextBounds {
    pub start: u64,
    pub end: u64,
}

impl TextBounds {
    /// Check if an address falls within the section. Comparison is numeric.
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Find the `.text` bounds in a gdb `info file` report.
///
/// The relevant line looks like
/// `0x0000555555555060 - 0x00005555555551f5 is .text`. The first `.text`
/// entry belongs to the executable; shared libraries follow it.
#[must_use]
pub fn parse_text_bounds(report: &str) -> Option<TextBounds> {
    for line in report.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 || parts[1] != "-" || parts[3] != "is" || parts[4] != ".text" {
            continue;
        }
        let start = crate::domain::parse_hex_address(parts[0])?;
        let end = crate::domain::parse_hex_address(parts[2])?;
        if end <= start {
            warn!("Ignoring empty .text range 0x{start:x} - 0x{end:x}");
            continue;
        }
        info!("Text section: 0x{:x} - 0x{:x} (size: {} KB)", start, end, (end - start) / 1024);
        return Some(TextBounds { start, end });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO_FILE: &str = "\
Symbols from \"/tmp/target\".
Native process:
\tUsing the running image of child process 4242.
\tWhile running this, GDB does not access memory from...
Local exec file:
\t`/tmp/target', file type elf64-x86-64.
\tEntry point: 0x555555555060
\t0x0000555555554318 - 0x0000555555554334 is .interp
\t0x0000555555555060 - 0x00005555555551f5 is .text
\t0x00005555555551f8 - 0x0000555555555205 is .fini
\t0x00007ffff7fc5090 - 0x00007ffff7fee315 is .text in /lib64/ld-linux-x86-64.so.2
";

    #[test]
    fn test_parse_text_bounds() {
        let bounds = parse_text_bounds(INFO_FILE).unwrap();
        assert_eq!(bounds.start, 0x5555_5555_5060);
        assert_eq!(bounds.end, 0x5555_5555_51f5);
    }

    #[test]
    fn test_parse_text_bounds_skips_inverted_range() {
        let report = "\
\t0x0000555555556000 - 0x0000555555555000 is .text
\t0x0000555555555060 - 0x00005555555551f5 is .text
";
        let bounds = parse_text_bounds(report).unwrap();
        assert_eq!(bounds.start, 0x5555_5555_5060);
        assert!(parse_text_bounds("\t0x2000 - 0x1000 is .text\n").is_none());
    }

    #[test]
    fn test_parse_text_bounds_absent() {
        assert!(parse_text_bounds("No symbol table is loaded.").is_none());
    }

    #[test]
    fn test_bounds_compare_numerically() {
        // As strings, "0x10000" < "0x9000"; numerically it is not.
        let bounds = TextBounds { start: 0x9000, end: 0x20000 };
        assert!(bounds.contains(0x10000));
        assert!(!bounds.contains(0x8fff));
        assert!(!bounds.contains(0x20000));
    }

    #[test]
    fn test_round_trip_with_image_base() {
        let t = AddressTranslation { load_bias: DEFAULT_LOAD_BIAS, image_base: 0x10_0000 };
        let runtime = t.to_runtime(0x10_1139).unwrap();
        assert_eq!(runtime, 0x5555_5555_5139);
        assert_eq!(t.to_static(runtime), Some(0x10_1139));
    }

    #[test]
    fn test_below_bias_has_no_static_address() {
        let t = AddressTranslation::default();
        assert!(t.to_static(0x1000).is_none());
        assert!(t.to_runtime(0x1139).is_some());
    }
}
