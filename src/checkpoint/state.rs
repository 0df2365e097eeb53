//! Checkpoint state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Identifier for a configured downstream sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SinkId {
    /// Read-modify-write key-list sink
    MergeList,
    /// Named-group bulk-append sink
    GroupedAppend,
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkId::MergeList => write!(f, "merge-list"),
            SinkId::GroupedAppend => write!(f, "grouped-append"),
        }
    }
}

/// Durable scan progress, persisted by [`CheckpointStore`](super::CheckpointStore)
///
/// Invariants: `last_scan_time` never decreases, `scanned_shas` only grows,
/// `processed_queries` is cleared exactly once per pass, and a key never
/// appears twice in one sink's pending set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Completion time of the most recent scan pass
    pub last_scan_time: Option<DateTime<Utc>>,
    /// Normalized queries completed in the current pass
    #[serde(default)]
    pub processed_queries: HashSet<String>,
    /// Content shas processed across all passes
    #[serde(default)]
    pub scanned_shas: HashSet<String>,
    /// Keys discovered but not yet confirmed delivered, per sink
    #[serde(default)]
    pub pending: BTreeMap<SinkId, BTreeSet<String>>,
}

impl Checkpoint {
    /// Reset per-pass bookkeeping. Called once at the start of each pass.
    pub fn begin_pass(&mut self) {
        self.processed_queries.clear();
    }

    pub fn is_query_processed(&self, normalized_query: &str) -> bool {
        self.processed_queries.contains(normalized_query)
    }

    pub fn mark_query_processed(&mut self, normalized_query: &str) {
        self.processed_queries.insert(normalized_query.to_string());
    }

    pub fn has_scanned_sha(&self, sha: &str) -> bool {
        self.scanned_shas.contains(sha)
    }

    pub fn add_scanned_sha(&mut self, sha: &str) {
        self.scanned_shas.insert(sha.to_string());
    }

    /// Advance the scan time; never moves backwards.
    pub fn update_scan_time(&mut self, now: DateTime<Utc>) {
        match self.last_scan_time {
            Some(current) if current >= now => {}
            _ => self.last_scan_time = Some(now),
        }
    }

    /// Set-union keys into a sink's pending set; returns how many were new.
    pub fn enqueue_pending(&mut self, sink: SinkId, keys: &[String]) -> usize {
        let pending = self.pending.entry(sink).or_default();
        let before = pending.len();
        pending.extend(keys.iter().cloned());
        pending.len() - before
    }

    /// Snapshot of a sink's pending keys
    pub fn pending_keys(&self, sink: SinkId) -> Vec<String> {
        self.pending
            .get(&sink)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pending_count(&self, sink: SinkId) -> usize {
        self.pending.get(&sink).map_or(0, BTreeSet::len)
    }

    /// Clear a sink's pending set after a confirmed-successful flush
    pub fn clear_pending(&mut self, sink: SinkId) {
        if let Some(set) = self.pending.get_mut(&sink) {
            set.clear();
        }
    }
}
