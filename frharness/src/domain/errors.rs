//! Structured error types for frharness
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from symbol resolution and probe parsing.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Too many probes: {requested} requested, at most {max} tags are available")]
    TooManyProbes { requested: usize, max: usize },

    #[error("Symbol {0} not found")]
    SymbolNotFound(String),

    #[error("Invalid probe entry: {0:?}")]
    InvalidProbe(String),

    #[error("{tool} failed: {error}")]
    ToolFailed { tool: String, error: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Precondition violations that should be surfaced before any work starts.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::TooManyProbes { .. } | Self::InvalidProbe(_))
    }
}

/// Errors from driving the debugger during probe discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to spawn debugger {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot {operation} while discovery is {phase}")]
    InvalidState { operation: &'static str, phase: String },

    #[error("No .text section reported by the debugger for {0}")]
    MissingTextSection(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the monitor/target process pair.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("No input set for target {0}")]
    InputNotSet(PathBuf),

    #[error("Monitor reported an error: {stdout} {stderr}")]
    MonitorReported { stdout: String, stderr: String },

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::InputNotSet(_))
    }

    /// Only a monitor-reported error is confined to the current attempt.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MonitorReported { .. })
    }
}

/// Errors from reading or writing a session directory.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Malformed metadata line: {0:?}")]
    MalformedMetadata(String),

    #[error("Malformed session info line: {0:?}")]
    MalformedSessionInfo(String),

    #[error("Hash {0} has progress but no metadata entry")]
    UnknownHash(String),

    #[error("No session ordinal left under {}", .0.display())]
    OrdinalExhausted(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_many_probes_display() {
        let err = ProbeError::TooManyProbes { requested: 27, max: 26 };
        assert!(err.to_string().contains("27"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_symbol_not_found_names_symbol() {
        let err = ProbeError::SymbolNotFound("parse_html".to_string());
        assert_eq!(err.to_string(), "Symbol parse_html not found");
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_monitor_reported_carries_both_streams() {
        let err = CaptureError::MonitorReported {
            stdout: "[!] bad args".to_string(),
            stderr: "usage".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[!] bad args"));
        assert!(msg.contains("usage"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_input_not_set_is_configuration() {
        let err = CaptureError::InputNotSet(PathBuf::from("/bin/target"));
        assert!(err.is_configuration());
        assert!(err.is_fatal());
    }
}
