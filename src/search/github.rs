//! GitHub code-search client
//!
//! Thin wrapper over the code search and raw-content endpoints. Tokens are
//! rotated round-robin across calls to spread rate-limit budget; every call
//! carries a bounded timeout.

use super::types::{parse_pushed_at, ResultItem, SearchResults};
use super::{SearchError, SearchProvider};
use crate::core::retry::{retry_async, RetryPolicy};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SEARCH_URL: &str = "https://api.github.com/search/code";
const USER_AGENT: &str = concat!("keysweep/", env!("CARGO_PKG_VERSION"));

pub struct GithubSearchClient {
    client: reqwest::Client,
    tokens: Vec<String>,
    next_token: AtomicUsize,
}

impl GithubSearchClient {
    pub fn new(tokens: Vec<String>) -> Result<Self, SearchError> {
        if tokens.is_empty() {
            return Err(SearchError::NoTokens);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            tokens,
            next_token: AtomicUsize::new(0),
        })
    }

    fn next_token(&self) -> &str {
        let index = self.next_token.fetch_add(1, Ordering::Relaxed) % self.tokens.len();
        &self.tokens[index]
    }

    fn parse_items(body: &serde_json::Value) -> Result<SearchResults, SearchError> {
        let items = body
            .get("items")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SearchError::Decode("missing items array".to_string()))?;

        let mut results = SearchResults::default();
        for item in items {
            let str_field = |v: &serde_json::Value, key: &str| {
                v.get(key)
                    .and_then(|s| s.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let repository = item.get("repository").cloned().unwrap_or_default();
            results.items.push(ResultItem {
                sha: str_field(item, "sha"),
                repo_full_name: str_field(&repository, "full_name"),
                repo_pushed_at: repository
                    .get("pushed_at")
                    .and_then(|v| v.as_str())
                    .and_then(parse_pushed_at),
                path: str_field(item, "path"),
                html_url: str_field(item, "html_url"),
                content_url: str_field(item, "url"),
            });
        }
        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for GithubSearchClient {
    async fn search(&self, query: &str) -> Result<Option<SearchResults>, SearchError> {
        // Transport-level failures are retried with a fresh token each attempt
        let response = retry_async("code search", RetryPolicy::default(), || async {
            self.client
                .get(SEARCH_URL)
                .query(&[("q", query), ("per_page", "100")])
                .header("Accept", "application/vnd.github+json")
                .bearer_auth(self.next_token())
                .send()
                .await
        })
        .await?;

        let status = response.status();
        if status.as_u16() == 403 || status.as_u16() == 429 {
            // Search rate limit: treat as a transient miss for this query
            log::warn!("Search rate limited (HTTP {}), deferring query", status);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        Ok(Some(Self::parse_items(&body)?))
    }

    async fn fetch_content(&self, item: &ResultItem) -> Result<Option<String>, SearchError> {
        if item.content_url.is_empty() {
            return Ok(None);
        }
        let response = self
            .client
            .get(&item.content_url)
            .header("Accept", "application/vnd.github.raw+json")
            .bearer_auth(self.next_token())
            .send()
            .await;

        // Fetch failures are non-fatal: the item is skipped, not retried
        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                log::warn!(
                    "Content fetch for {} returned HTTP {}",
                    item.html_url,
                    response.status()
                );
                return Ok(None);
            }
            Err(e) => {
                log::warn!("Content fetch for {} failed: {}", item.html_url, e);
                return Ok(None);
            }
        };

        match response.text().await {
            Ok(text) if !text.is_empty() => Ok(Some(text)),
            _ => Ok(None),
        }
    }
}
