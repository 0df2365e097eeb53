//! Search result types

use chrono::{DateTime, Utc};

/// One search hit: produced by the search collaborator, consumed once by the
/// filter and triage pipeline, then discarded.
#[derive(Debug, Clone)]
pub struct ResultItem {
    /// Content identifier (blob sha)
    pub sha: String,
    /// Owning repository, e.g. `owner/name`
    pub repo_full_name: String,
    /// Last push to the owning repository
    pub repo_pushed_at: Option<DateTime<Utc>>,
    /// Path of the matching file within the repository
    pub path: String,
    /// Human-facing URL of the file
    pub html_url: String,
    /// Raw-content fetch handle
    pub content_url: String,
}

/// One page of search hits, in index order
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub items: Vec<ResultItem>,
}

/// Parse the search index's `YYYY-MM-DDTHH:MM:SSZ` timestamp form.
pub fn parse_pushed_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_pushed_at() {
        assert_eq!(
            parse_pushed_at("2025-06-01T08:30:00Z"),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap())
        );
        assert_eq!(parse_pushed_at("not a timestamp"), None);
    }
}
