//! External collaborators: search index, content fetch, key validation
//!
//! These are the I/O leaves of the system. Each is reached through a trait
//! so the scan pipeline can be exercised with fakes in tests.

pub mod github;
pub mod types;
pub mod validator;

pub use github::GithubSearchClient;
pub use types::{ResultItem, SearchResults};
pub use validator::{HttpKeyValidator, KeyValidator, Verdict};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search returned HTTP {status}")]
    Status { status: u16 },
    #[error("unexpected search response: {0}")]
    Decode(String),
    #[error("search token pool is empty")]
    NoTokens,
}

/// Issues search queries and fetches raw file content.
///
/// `search` returns `None` when the index produced no usable response for
/// this query (treated as a transient miss, not an error). `fetch_content`
/// returns `None` on a non-fatal fetch failure; the caller skips the item
/// without retrying in the same pass.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Option<SearchResults>, SearchError>;
    async fn fetch_content(&self, item: &ResultItem) -> Result<Option<String>, SearchError>;
}
