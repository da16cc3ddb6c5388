//! gdb batch script generation
//!
//! Layout of a discovery script:
//!
//! ```text
//! set logging file <transcript>
//! set logging on
//! b *0x555555555139            one per accepted candidate
//! commands 1-N                 on any hit: print $pc and continue
//!     silent
//!     info reg $pc
//!     cont
//! end
//! enable count <ceiling> 1-N   disable a breakpoint after <ceiling> hits
//! run
//! ```

use log::{debug, warn};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use super::translation::{AddressTranslation, TextBounds};

/// Hits after which a breakpoint disables itself.
pub const DEFAULT_HIT_CEILING: u32 = 100;

#[derive(Debug, Clone)]
pub struct DebuggerScript {
    text: String,
    breakpoints: Vec<u64>,
}

impl DebuggerScript {
    /// Start a script whose transcript is written to `transcript`.
    #[must_use]
    pub fn new(transcript: &Path) -> Self {
        let text = format!("set logging file {}\nset logging on\n", transcript.display());
        Self { text, breakpoints: Vec::new() }
    }

    /// The bounds-probing script: stop at the first instruction and report
    /// the section layout.
    #[must_use]
    pub fn text_section_probe(transcript: &Path) -> Self {
        let mut script = Self::new(transcript);
        script.push_command("starti");
        script.push_command("info file");
        script.push_command("quit");
        script
    }

    /// Add one breakpoint per candidate that lands inside `bounds`.
    ///
    /// Candidates are static addresses; they are translated before the bounds
    /// check. With no bounds every translatable candidate is accepted.
    /// Returns how many breakpoints were added.
    pub fn set_breakpoints(
        &mut self,
        candidates: &[u64],
        translation: &AddressTranslation,
        bounds: Option<&TextBounds>,
    ) -> usize {
        let before = self.breakpoints.len();

        for &candidate in candidates {
            let Some(runtime) = translation.to_runtime(candidate) else {
                warn!("Cannot translate candidate 0x{candidate:x}, skipping");
                continue;
            };
            if let Some(bounds) = bounds {
                if !bounds.contains(runtime) {
                    debug!("0x{runtime:x} outside .text, skipping");
                    continue;
                }
            }
            let _ = writeln!(self.text, "b *0x{runtime:x}");
            self.breakpoints.push(runtime);
        }

        self.breakpoints.len() - before
    }

    /// Silently print `$pc` and continue on every hit in the breakpoint range.
    pub fn set_command_pc(&mut self) {
        let Some(range) = self.breakpoint_range() else {
            return;
        };
        let _ = writeln!(self.text, "commands {range}");
        self.text.push_str("\tsilent\n");
        self.text.push_str("\tinfo reg $pc\n");
        self.text.push_str("\tcont\n");
        self.text.push_str("end\n");
    }

    /// Disable each breakpoint in the range after `count` hits.
    pub fn enable_count(&mut self, count: u32) {
        let Some(range) = self.breakpoint_range() else {
            return;
        };
        let _ = writeln!(self.text, "enable count {count} {range}");
    }

    pub fn stop_on_solib_events(&mut self) {
        self.push_command("set stop-on-solib-events 1");
    }

    /// Append a raw gdb directive.
    pub fn push_command(&mut self, cmd: &str) {
        self.text.push_str(cmd);
        self.text.push('\n');
    }

    /// Runtime addresses of the breakpoints, in script order.
    #[must_use]
    pub fn breakpoints(&self) -> &[u64] {
        &self.breakpoints
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Write the script out.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, &self.text)
    }

    /// gdb numbers breakpoints from 1 in a fresh session.
    fn breakpoint_range(&self) -> Option<String> {
        if self.breakpoints.is_empty() {
            return None;
        }
        Some(format!("1-{}", self.breakpoints.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::translation::DEFAULT_LOAD_BIAS;

    fn transcript() -> &'static Path {
        Path::new("/tmp/gdb_output")
    }

    #[test]
    fn test_full_script_layout() {
        let mut script = DebuggerScript::new(transcript());
        let added =
            script.set_breakpoints(&[0x1139, 0x11a0], &AddressTranslation::default(), None);
        script.set_command_pc();
        script.enable_count(100);
        script.push_command("run");

        assert_eq!(added, 2);
        assert_eq!(
            script.text(),
            "set logging file /tmp/gdb_output\n\
             set logging on\n\
             b *0x555555555139\n\
             b *0x5555555551a0\n\
             commands 1-2\n\
             \tsilent\n\
             \tinfo reg $pc\n\
             \tcont\n\
             end\n\
             enable count 100 1-2\n\
             run\n"
        );
    }

    #[test]
    fn test_out_of_bounds_candidates_skipped() {
        let bounds =
            TextBounds { start: DEFAULT_LOAD_BIAS + 0x1060, end: DEFAULT_LOAD_BIAS + 0x11f5 };
        let mut script = DebuggerScript::new(transcript());
        // 0x20 lands before .text, 0x5000 after it.
        let added = script.set_breakpoints(
            &[0x20, 0x1139, 0x5000],
            &AddressTranslation::default(),
            Some(&bounds),
        );
        assert_eq!(added, 1);
        assert_eq!(script.breakpoints(), &[DEFAULT_LOAD_BIAS + 0x1139]);
    }

    #[test]
    fn test_range_counts_accepted_breakpoints_only() {
        let bounds = TextBounds { start: DEFAULT_LOAD_BIAS, end: DEFAULT_LOAD_BIAS + 0x2000 };
        let mut script = DebuggerScript::new(transcript());
        script.set_breakpoints(
            &[0x1000, 0x9000, 0x1100],
            &AddressTranslation::default(),
            Some(&bounds),
        );
        script.set_command_pc();
        script.enable_count(5);
        assert!(script.text().contains("commands 1-2\n"));
        assert!(script.text().contains("enable count 5 1-2\n"));
    }

    #[test]
    fn test_no_breakpoints_no_command_block() {
        let mut script = DebuggerScript::new(transcript());
        script.set_command_pc();
        script.enable_count(100);
        assert!(!script.text().contains("commands"));
        assert!(!script.text().contains("enable count"));
    }

    #[test]
    fn test_image_base_subtracted_before_bias() {
        let translation =
            AddressTranslation { load_bias: DEFAULT_LOAD_BIAS, image_base: 0x10_0000 };
        let mut script = DebuggerScript::new(transcript());
        script.set_breakpoints(&[0x10_1139], &translation, None);
        assert_eq!(script.breakpoints(), &[0x5555_5555_5139]);
    }

    #[test]
    fn test_text_section_probe() {
        let script = DebuggerScript::text_section_probe(transcript());
        assert!(script.text().ends_with("starti\ninfo file\nquit\n"));
        assert!(script.breakpoints().is_empty());
    }
}
