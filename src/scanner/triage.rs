//! Key extraction and triage
//!
//! Candidate secrets are pulled out of raw content with the provider
//! pattern, obvious documentation placeholders are dropped, duplicates
//! within the blob collapse to one candidate, and the survivors are
//! validated and partitioned into valid / rate-limited / invalid.

use crate::search::{KeyValidator, Verdict};
use regex::Regex;
use std::collections::HashSet;

/// Characters of context inspected around each match for placeholder markers
const DEFAULT_LOOKAHEAD: usize = 45;

/// Extracts candidate keys matching the provider pattern
pub struct KeyExtractor {
    pattern: Regex,
    lookahead: usize,
}

impl KeyExtractor {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            lookahead: DEFAULT_LOOKAHEAD,
        })
    }

    #[cfg(test)]
    pub fn with_lookahead(pattern: &str, lookahead: usize) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            lookahead,
        })
    }

    /// All distinct, placeholder-free candidates in `content`, first-seen order.
    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for found in self.pattern.find_iter(content) {
            // Window starting at the match: an ellipsis or YOUR_ marker close
            // by indicates a documentation example, not a real secret
            let window: String = content[found.start()..]
                .chars()
                .take(self.lookahead)
                .collect();
            if window.contains("...") || window.to_uppercase().contains("YOUR_") {
                continue;
            }

            let candidate = found.as_str().to_string();
            if seen.insert(candidate.clone()) {
                candidates.push(candidate);
            }
        }

        candidates
    }
}

/// Triage result for one content blob
#[derive(Debug, Clone, Default)]
pub struct TriageOutcome {
    pub valid: Vec<String>,
    pub rate_limited: Vec<String>,
}

impl TriageOutcome {
    pub fn is_empty(&self) -> bool {
        self.valid.is_empty() && self.rate_limited.is_empty()
    }
}

/// Validate every extracted candidate and partition by verdict.
///
/// Keys with any verdict other than ok or rate-limited are logged and
/// dropped here; they never reach the dispatcher or the report files.
pub async fn triage(
    extractor: &KeyExtractor,
    validator: &dyn KeyValidator,
    content: &str,
) -> TriageOutcome {
    let candidates = extractor.extract(content);
    if candidates.is_empty() {
        return TriageOutcome::default();
    }

    log::info!("Found {} suspected key(s), validating...", candidates.len());

    let mut outcome = TriageOutcome::default();
    for candidate in candidates {
        let verdict = validator.validate(&candidate).await;
        match verdict {
            Verdict::Ok => {
                log::info!("VALID: {}", candidate);
                outcome.valid.push(candidate);
            }
            Verdict::RateLimited => {
                log::warn!("RATE LIMITED: {}", candidate);
                outcome.rate_limited.push(candidate);
            }
            other => {
                log::info!("INVALID: {}, verdict: {}", candidate, other);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PATTERN: &str = r"xai-[a-zA-Z0-9\-_]{30,}";

    fn key(suffix: char) -> String {
        format!("xai-{}", String::from(suffix).repeat(30))
    }

    struct ScriptedValidator {
        calls: AtomicUsize,
        verdicts: Mutex<Vec<(String, Verdict)>>,
    }

    impl ScriptedValidator {
        fn new(verdicts: Vec<(String, Verdict)>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                verdicts: Mutex::new(verdicts),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyValidator for ScriptedValidator {
        async fn validate(&self, candidate: &str) -> Verdict {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdicts
                .lock()
                .unwrap()
                .iter()
                .find(|(key, _)| key == candidate)
                .map(|(_, verdict)| verdict.clone())
                .unwrap_or(Verdict::Unauthorized)
        }
    }

    #[test]
    fn test_extract_finds_pattern_matches() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = format!("token = \"{}\"\nother = \"{}\"\n", key('a'), key('b'));
        let candidates = extractor.extract(&content);
        assert_eq!(candidates, vec![key('a'), key('b')]);
    }

    #[test]
    fn test_extract_rejects_ellipsis_placeholder() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        // Matches the pattern exactly, but the ellipsis marks a doc example
        let content = format!("api_key = {}...", key('a'));
        assert!(extractor.extract(&content).is_empty());
    }

    #[test]
    fn test_extract_rejects_your_placeholder_case_insensitively() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = "api_key = xai-your_key_goes_right_here_please_x".to_string();
        assert!(extractor.extract(&content).is_empty());
    }

    #[test]
    fn test_extract_dedups_within_blob() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = format!("{}\n{}\n{}\n", key('a'), key('a'), key('a'));
        assert_eq!(extractor.extract(&content), vec![key('a')]);
    }

    #[test]
    fn test_extract_survives_multibyte_content() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = format!("密钥 = {} 备注", key('a'));
        assert_eq!(extractor.extract(&content), vec![key('a')]);
    }

    #[test]
    fn test_lookahead_window_is_bounded() {
        // Ellipsis beyond the window must not reject the candidate
        let extractor = KeyExtractor::with_lookahead(PATTERN, 35).unwrap();
        let content = format!("{} and then much later ... text", key('a'));
        assert_eq!(extractor.extract(&content), vec![key('a')]);
    }

    #[tokio::test]
    async fn test_triage_partitions_by_verdict() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = format!("{}\n{}\n{}\n", key('a'), key('b'), key('c'));
        let validator = ScriptedValidator::new(vec![
            (key('a'), Verdict::Ok),
            (key('b'), Verdict::RateLimited),
            (key('c'), Verdict::Unauthorized),
        ]);

        let outcome = triage(&extractor, &validator, &content).await;

        assert_eq!(outcome.valid, vec![key('a')]);
        assert_eq!(outcome.rate_limited, vec![key('b')]);
    }

    #[tokio::test]
    async fn test_duplicates_validated_once() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = format!("{}\n{}\n{}\n", key('a'), key('a'), key('b'));
        let validator = ScriptedValidator::new(vec![
            (key('a'), Verdict::Ok),
            (key('b'), Verdict::Ok),
        ]);

        let outcome = triage(&extractor, &validator, &content).await;

        // Validation call count is bounded by distinct matches
        assert_eq!(validator.call_count(), 2);
        assert_eq!(outcome.valid.len(), 2);
    }

    #[tokio::test]
    async fn test_transient_verdicts_are_dropped() {
        let extractor = KeyExtractor::new(PATTERN).unwrap();
        let content = key('a');
        let validator =
            ScriptedValidator::new(vec![(key('a'), Verdict::Transient("timeout".to_string()))]);

        let outcome = triage(&extractor, &validator, &content).await;
        assert!(outcome.is_empty());
    }
}
