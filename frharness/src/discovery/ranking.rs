//! Cross-input ranking of probe candidates.
//!
//! Each debugger run yields per-address hit counts. The top-N addresses of a
//! run each earn one vote; addresses with the most votes across inputs are
//! exercised regardless of input content and make the most reliable probes.

use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

/// Hits observed for one address in one debugger run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord {
    pub address: u64,
    pub count: usize,
}

/// Aggregate raw `$pc` samples into records sorted ascending by count.
///
/// Ties are broken by address so the order is deterministic.
#[must_use]
pub fn aggregate_hits(addresses: impl IntoIterator<Item = u64>) -> Vec<HitRecord> {
    let mut counts: HashMap<u64, usize> = HashMap::new();
    for addr in addresses {
        *counts.entry(addr).or_insert(0) += 1;
    }

    let mut hits: Vec<HitRecord> =
        counts.into_iter().map(|(address, count)| HitRecord { address, count }).collect();
    hits.sort_by_key(|h| (h.count, h.address));
    hits
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedProbe {
    #[serde(serialize_with = "serialize_hex")]
    pub address: u64,
    pub frequency: usize,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_hex<S: serde::Serializer>(addr: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("0x{addr:x}"))
}

/// Persistent frequency table across discovery inputs
#[derive(Debug, Default)]
pub struct ProbeRanking {
    frequency: HashMap<u64, usize>,
    inputs: usize,
}

impl ProbeRanking {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vote for the `top_n` most-hit addresses of one run.
    ///
    /// `hits` must be sorted ascending by count, as returned by
    /// [`aggregate_hits`]. A run with no hits still counts as an input.
    pub fn record_top(&mut self, hits: &[HitRecord], top_n: usize) {
        let skip = hits.len().saturating_sub(top_n);
        for hit in &hits[skip..] {
            *self.frequency.entry(hit.address).or_insert(0) += 1;
        }
        self.inputs += 1;
    }

    /// Number of inputs recorded so far
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.inputs
    }

    /// Candidates by descending frequency, then ascending address.
    #[must_use]
    pub fn ranked(&self) -> Vec<RankedProbe> {
        let mut ranked: Vec<RankedProbe> = self
            .frequency
            .iter()
            .map(|(&address, &frequency)| RankedProbe { address, frequency })
            .collect();
        ranked.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.address.cmp(&b.address)));
        ranked
    }

    /// Write the ranked list as JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn export_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, &self.ranked())
    }
}
