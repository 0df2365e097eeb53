//! Skip-decision filter
//!
//! Decides, per result item, whether triage can be skipped. Rules run in
//! strict order with the cheapest checks first; the first matching rule wins
//! and the reasons are mutually exclusive for stats purposes.

use crate::checkpoint::Checkpoint;
use crate::search::ResultItem;
use chrono::{DateTime, Duration, Utc};

/// Why an item was skipped, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Repository unchanged since the last completed scan
    TimeFilter,
    /// Content sha already processed in an earlier pass or query
    ShaDuplicate,
    /// Repository last pushed outside the retention window
    AgeFilter,
    /// Path matches a documentation/example blacklist entry
    DocFilter,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TimeFilter => write!(f, "time_filter"),
            SkipReason::ShaDuplicate => write!(f, "sha_duplicate"),
            SkipReason::AgeFilter => write!(f, "age_filter"),
            SkipReason::DocFilter => write!(f, "doc_filter"),
        }
    }
}

/// Per-reason skip counters, reported at the end of each pass
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipStats {
    pub time_filter: usize,
    pub sha_duplicate: usize,
    pub age_filter: usize,
    pub doc_filter: usize,
}

impl SkipStats {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::TimeFilter => self.time_filter += 1,
            SkipReason::ShaDuplicate => self.sha_duplicate += 1,
            SkipReason::AgeFilter => self.age_filter += 1,
            SkipReason::DocFilter => self.doc_filter += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.time_filter + self.sha_duplicate + self.age_filter + self.doc_filter
    }
}

impl std::fmt::Display for SkipStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "time_filter={} sha_duplicate={} age_filter={} doc_filter={}",
            self.time_filter, self.sha_duplicate, self.age_filter, self.doc_filter
        )
    }
}

/// Decide whether `item` can be skipped without triage.
///
/// `now` is injected so the retention window is testable.
pub fn should_skip(
    item: &ResultItem,
    checkpoint: &Checkpoint,
    retention_days: i64,
    path_blacklist: &[String],
    now: DateTime<Utc>,
) -> Option<SkipReason> {
    if let (Some(last_scan), Some(pushed_at)) = (checkpoint.last_scan_time, item.repo_pushed_at) {
        if pushed_at <= last_scan {
            return Some(SkipReason::TimeFilter);
        }
    }

    if checkpoint.has_scanned_sha(&item.sha) {
        return Some(SkipReason::ShaDuplicate);
    }

    if let Some(pushed_at) = item.repo_pushed_at {
        if pushed_at < now - Duration::days(retention_days) {
            return Some(SkipReason::AgeFilter);
        }
    }

    let lowercase_path = item.path.to_lowercase();
    if path_blacklist
        .iter()
        .any(|token| lowercase_path.contains(token.as_str()))
    {
        return Some(SkipReason::DocFilter);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(sha: &str, path: &str, pushed_at: Option<DateTime<Utc>>) -> ResultItem {
        ResultItem {
            sha: sha.to_string(),
            repo_full_name: "owner/repo".to_string(),
            repo_pushed_at: pushed_at,
            path: path.to_string(),
            html_url: String::new(),
            content_url: String::new(),
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    const BLACKLIST: &[&str] = &["readme", "docs/", "example"];

    fn blacklist() -> Vec<String> {
        BLACKLIST.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_time_filter_wins_first() {
        let mut checkpoint = Checkpoint::default();
        checkpoint.update_scan_time(at(10));
        // Item also has a duplicate sha; time_filter must still win
        checkpoint.add_scanned_sha("dup");

        let reason = should_skip(
            &item("dup", "src/app.py", Some(at(9))),
            &checkpoint,
            730,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, Some(SkipReason::TimeFilter));
    }

    #[test]
    fn test_sha_duplicate_after_time_filter() {
        let mut checkpoint = Checkpoint::default();
        checkpoint.update_scan_time(at(10));
        checkpoint.add_scanned_sha("dup");

        // Pushed after the last scan, so time_filter passes; sha check fires
        let reason = should_skip(
            &item("dup", "src/app.py", Some(at(11))),
            &checkpoint,
            730,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, Some(SkipReason::ShaDuplicate));
    }

    #[test]
    fn test_age_filter_uses_retention_window() {
        let checkpoint = Checkpoint::default();
        let reason = should_skip(
            &item("sha1", "src/app.py", Some(at(1))),
            &checkpoint,
            7,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, Some(SkipReason::AgeFilter));
    }

    #[test]
    fn test_doc_filter_is_case_insensitive() {
        let checkpoint = Checkpoint::default();
        let reason = should_skip(
            &item("sha1", "project/README.md", Some(at(19))),
            &checkpoint,
            730,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, Some(SkipReason::DocFilter));
    }

    #[test]
    fn test_fresh_item_is_processed() {
        let checkpoint = Checkpoint::default();
        let reason = should_skip(
            &item("sha1", "src/app.py", Some(at(19))),
            &checkpoint,
            730,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, None);
    }

    #[test]
    fn test_missing_pushed_at_skips_time_and_age_rules() {
        let mut checkpoint = Checkpoint::default();
        checkpoint.update_scan_time(at(10));

        let reason = should_skip(
            &item("sha1", "src/app.py", None),
            &checkpoint,
            7,
            &blacklist(),
            at(20),
        );
        assert_eq!(reason, None);
    }

    #[test]
    fn test_stats_counters_record_each_reason() {
        let mut stats = SkipStats::default();
        stats.record(SkipReason::TimeFilter);
        stats.record(SkipReason::TimeFilter);
        stats.record(SkipReason::DocFilter);
        assert_eq!(stats.time_filter, 2);
        assert_eq!(stats.doc_filter, 1);
        assert_eq!(stats.total(), 3);
    }
}
