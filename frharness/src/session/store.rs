//! Session directory layout and append-only bookkeeping
//!
//! ```text
//! <campaign>/session_NN/
//!     01_METADATA       <hash>: <input>                 one line per input
//!     02_SESSION_INFO   <hash> : [<ok>/<tried>] : <load> one line per input
//!     03_CPU_INFO       host snapshot, written once
//!     <hash>_<index>    one captured trace per file
//! ```
//!
//! A session has a single writer. Sample indices are allocated by scanning
//! the directory, so two writers on one session could pick the same index;
//! the second write then fails rather than overwriting.

use log::info;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::{ContentHash, SessionError};

pub const SESSION_PREFIX: &str = "session_";
pub const METADATA_FILE: &str = "01_METADATA";
pub const SESSION_INFO_FILE: &str = "02_SESSION_INFO";
pub const CPU_INFO_FILE: &str = "03_CPU_INFO";

/// Create the next `session_NN` directory under `campaign_dir`.
///
/// Ordinals continue from the highest existing one; entries that do not
/// follow the naming convention are ignored.
///
/// # Errors
/// Returns an error if the campaign directory cannot be listed or the session
/// directory cannot be created.
pub fn allocate_session(campaign_dir: &Path) -> Result<Session, SessionError> {
    let mut highest = 0u32;

    for entry in fs::read_dir(campaign_dir)?.flatten() {
        if !entry.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let name = entry.file_name();
        if let Some(ordinal) = parse_session_ordinal(&name.to_string_lossy()) {
            highest = highest.max(ordinal);
        }
    }

    let next = highest
        .checked_add(1)
        .ok_or_else(|| SessionError::OrdinalExhausted(campaign_dir.to_path_buf()))?;
    let path = campaign_dir.join(format!("{SESSION_PREFIX}{next:02}"));
    fs::create_dir(&path)?;
    info!("Allocated session {}", path.display());
    Ok(Session { path })
}

fn parse_session_ordinal(name: &str) -> Option<u32> {
    let suffix = name.strip_prefix(SESSION_PREFIX)?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Handle to one session directory
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
}

impl Session {
    /// Reopen an existing session, e.g. for gap-filling.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    #[must_use]
    pub fn session_info_path(&self) -> PathBuf {
        self.path.join(SESSION_INFO_FILE)
    }

    #[must_use]
    pub fn cpu_info_path(&self) -> PathBuf {
        self.path.join(CPU_INFO_FILE)
    }

    /// Write the host snapshot. Fails if one was already written.
    ///
    /// # Errors
    /// Returns an error if the file exists or cannot be written.
    pub fn write_cpu_info(&self, snapshot: &str) -> Result<(), SessionError> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(self.cpu_info_path())?;
        file.write_all(snapshot.as_bytes())?;
        Ok(())
    }

    /// Log the start of an input: its metadata line and the opening half of
    /// its progress line. Returns the input's content hash.
    ///
    /// # Errors
    /// Returns an error if either ledger cannot be appended to.
    pub fn record_attempt_start(&self, input: &str) -> Result<ContentHash, SessionError> {
        let hash = ContentHash::of(input);
        append(&self.metadata_path(), &format!("{hash}: {input}\n"))?;
        append(&self.session_info_path(), &format!("{hash} : "))?;
        Ok(hash)
    }

    /// Store one trace as `<hash>_<next index>`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be scanned or the file cannot
    /// be created.
    pub fn record_sample(&self, hash: &ContentHash, data: &str) -> Result<PathBuf, SessionError> {
        let index = self.next_sample_index(hash)?;
        let path = self.path.join(format!("{hash}_{index}"));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(data.as_bytes())?;
        Ok(path)
    }

    /// Complete the progress line opened by [`Self::record_attempt_start`].
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be appended to.
    pub fn record_outcome(
        &self,
        successes: u64,
        attempted: u64,
        host_load: &str,
    ) -> Result<(), SessionError> {
        append(&self.session_info_path(), &format!("[{successes}/{attempted}] : {host_load}\n"))
    }

    /// One past the highest stored index for `hash`, or 0 if none exist.
    ///
    /// # Errors
    /// Returns an error if the session directory cannot be listed.
    pub fn next_sample_index(&self, hash: &ContentHash) -> Result<u64, SessionError> {
        Ok(self.sample_indices(hash)?.into_iter().max().map_or(0, |max| max + 1))
    }

    /// Every stored index for `hash`, ascending.
    ///
    /// # Errors
    /// Returns an error if the session directory cannot be listed.
    pub fn sample_indices(&self, hash: &ContentHash) -> Result<Vec<u64>, SessionError> {
        let prefix = format!("{hash}_");
        let mut indices: Vec<u64> = fs::read_dir(&self.path)?
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.strip_prefix(&prefix)?.parse().ok())
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }
}

fn append(path: &Path, text: &str) -> Result<(), SessionError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    Ok(())
}
