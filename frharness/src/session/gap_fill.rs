//! Gap-fill planning
//!
//! Joins `01_METADATA` (hash → input) with `02_SESSION_INFO`
//! (hash → successes/attempted) to work out how many captures each input
//! still needs to reach its original target.

use log::warn;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::domain::{ContentHash, SessionError};

/// An input that still needs `missing` captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapFill {
    pub hash: ContentHash,
    pub input: String,
    pub missing: u64,
}

/// Per-input yield from one progress line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub successes: u64,
    pub attempted: u64,
}

impl Progress {
    #[must_use]
    pub fn missing(&self) -> u64 {
        self.attempted.saturating_sub(self.successes)
    }
}

/// Parse `<hash>: <input>` lines.
///
/// # Errors
/// `MalformedMetadata` for a non-blank line without the `": "` separator.
pub fn parse_metadata(content: &str) -> Result<HashMap<ContentHash, String>, SessionError> {
    let mut metadata = HashMap::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let (hash, input) =
            line.split_once(": ").ok_or_else(|| SessionError::MalformedMetadata(line.to_string()))?;
        metadata.insert(ContentHash::from_hex(hash), input.to_string());
    }
    Ok(metadata)
}

/// Parse `<hash> : [<ok>/<tried>] : <load>` lines, in file order.
///
/// A line with a hash but no outcome (the campaign stopped mid-input) is
/// skipped with a warning.
///
/// # Errors
/// `MalformedSessionInfo` if the outcome field cannot be parsed.
pub fn parse_session_info(content: &str) -> Result<Vec<(ContentHash, Progress)>, SessionError> {
    let mut entries = Vec::new();

    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        let malformed = || SessionError::MalformedSessionInfo(line.to_string());
        let (hash, rest) = line.split_once(':').ok_or_else(malformed)?;
        let rest = rest.trim();
        if rest.is_empty() {
            warn!("No outcome recorded for {}, skipping", hash.trim());
            continue;
        }

        let counts = rest.split_once(':').map_or(rest, |(counts, _load)| counts).trim();
        let counts = counts
            .strip_prefix('[')
            .and_then(|c| c.strip_suffix(']'))
            .ok_or_else(malformed)?;
        let (successes, attempted) = counts.split_once('/').ok_or_else(malformed)?;
        let progress = Progress {
            successes: successes.trim().parse().map_err(|_| malformed())?,
            attempted: attempted.trim().parse().map_err(|_| malformed())?,
        };
        entries.push((ContentHash::from_hex(hash), progress));
    }

    Ok(entries)
}

/// Plan from ledger contents. Inputs with nothing missing are left out; an
/// input listed more than once accumulates its gaps.
///
/// # Errors
/// Parse errors from either ledger; `UnknownHash` if progress refers to a
/// hash with no metadata.
pub fn plan_from_contents(
    metadata: &str,
    session_info: &str,
) -> Result<Vec<GapFill>, SessionError> {
    let metadata = parse_metadata(metadata)?;
    let mut plan: Vec<GapFill> = Vec::new();

    for (hash, progress) in parse_session_info(session_info)? {
        let input =
            metadata.get(&hash).ok_or_else(|| SessionError::UnknownHash(hash.to_string()))?;
        if progress.missing() == 0 {
            continue;
        }
        if let Some(existing) = plan.iter_mut().find(|g| g.hash == hash) {
            existing.missing += progress.missing();
        } else {
            plan.push(GapFill { hash, input: input.clone(), missing: progress.missing() });
        }
    }

    Ok(plan)
}

/// Read both ledgers and plan the remaining captures.
///
/// # Errors
/// See [`plan_from_contents`]; `Io` if either file cannot be read.
pub fn plan_gap_fill(
    metadata_file: &Path,
    session_info_file: &Path,
) -> Result<Vec<GapFill>, SessionError> {
    let metadata = fs::read_to_string(metadata_file)?;
    let session_info = fs::read_to_string(session_info_file)?;
    plan_from_contents(&metadata, &session_info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_reports_missing_count() {
        let plan = plan_from_contents(
            "abc123: http://x\n",
            "abc123 : [3/5] : 0.52 0.58 0.59 1/123 4567\n",
        )
        .unwrap();
        assert_eq!(
            plan,
            vec![GapFill {
                hash: ContentHash::from_hex("abc123"),
                input: "http://x".to_string(),
                missing: 2
            }]
        );
    }

    #[test]
    fn test_complete_inputs_are_omitted() {
        let plan = plan_from_contents(
            "aa: http://a\nbb: http://b\n",
            "aa : [5/5] : 0.1 0.1 0.1 1/1 1\nbb : [0/5] : 0.1 0.1 0.1 1/1 1\n",
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].input, "http://b");
        assert_eq!(plan[0].missing, 5);
    }

    #[test]
    fn test_input_keeps_text_after_first_separator() {
        let metadata = parse_metadata("aa: key: value\n").unwrap();
        assert_eq!(metadata[&ContentHash::from_hex("aa")], "key: value");
    }

    #[test]
    fn test_incomplete_progress_line_is_skipped() {
        let entries = parse_session_info("aa : [1/2] : 0.1\nbb : ").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, ContentHash::from_hex("aa"));
    }

    #[test]
    fn test_malformed_progress_is_an_error() {
        assert!(matches!(
            parse_session_info("aa : 1/2 : 0.1\n"),
            Err(SessionError::MalformedSessionInfo(_))
        ));
        assert!(matches!(
            parse_session_info("aa : [x/2] : 0.1\n"),
            Err(SessionError::MalformedSessionInfo(_))
        ));
    }

    #[test]
    fn test_unknown_hash() {
        let err = plan_from_contents("aa: http://a\n", "bb : [0/1] : 0.1\n").unwrap_err();
        assert!(matches!(err, SessionError::UnknownHash(ref h) if h == "bb"));
    }

    #[test]
    fn test_repeated_input_accumulates() {
        let plan = plan_from_contents(
            "aa: http://a\naa: http://a\n",
            "aa : [1/3] : 0.1\naa : [2/3] : 0.1\n",
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].missing, 3);
    }
}
