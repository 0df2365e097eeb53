//! Shared fakes and fixtures for pipeline integration tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keysweep::checkpoint::{Checkpoint, CheckpointStore};
use keysweep::core::config::Config;
use keysweep::output::ReportWriter;
use keysweep::scanner::ScanManager;
use keysweep::search::{
    KeyValidator, ResultItem, SearchError, SearchProvider, SearchResults, Verdict,
};
use keysweep::sync::{MergeListSink, MergeTransport, SyncDispatcher, SyncError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

/// A syntactically valid candidate key built from a repeated suffix
pub fn test_key(suffix: char) -> String {
    format!("xai-{}", String::from(suffix).repeat(30))
}

pub fn item(sha: &str, path: &str, pushed_at: DateTime<Utc>) -> ResultItem {
    ResultItem {
        sha: sha.to_string(),
        repo_full_name: "owner/repo".to_string(),
        repo_pushed_at: Some(pushed_at),
        path: path.to_string(),
        html_url: format!("https://example.com/{path}"),
        content_url: format!("https://api.example.com/{path}"),
    }
}

/// Scripted search provider: fixed result pages per query, fixed content per
/// sha, and a record of every search call.
#[derive(Default)]
pub struct FakeSearch {
    pages: HashMap<String, Vec<ResultItem>>,
    contents: HashMap<String, String>,
    pub search_calls: StdMutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, query: &str, items: Vec<ResultItem>) -> Self {
        self.pages.insert(query.to_string(), items);
        self
    }

    pub fn with_content(mut self, sha: &str, content: &str) -> Self {
        self.contents.insert(sha.to_string(), content.to_string());
        self
    }

    pub fn search_call_count(&self) -> usize {
        self.search_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str) -> Result<Option<SearchResults>, SearchError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        Ok(Some(SearchResults {
            items: self.pages.get(query).cloned().unwrap_or_default(),
        }))
    }

    async fn fetch_content(&self, item: &ResultItem) -> Result<Option<String>, SearchError> {
        Ok(self.contents.get(&item.sha).cloned())
    }
}

/// Validator that declares every candidate live
pub struct AlwaysValid;

#[async_trait]
impl KeyValidator for AlwaysValid {
    async fn validate(&self, _candidate: &str) -> Verdict {
        Verdict::Ok
    }
}

/// Merge transport that accepts everything and echoes writes
pub struct AcceptingMergeTransport;

#[async_trait]
impl MergeTransport for AcceptingMergeTransport {
    async fn get_config(&self) -> Result<serde_json::Value, SyncError> {
        Ok(serde_json::json!({ "API_KEYS": [] }))
    }

    async fn put_config(&self, config: &serde_json::Value) -> Result<serde_json::Value, SyncError> {
        Ok(config.clone())
    }
}

pub struct Harness {
    pub manager: ScanManager,
    pub checkpoint: Arc<Mutex<Checkpoint>>,
    pub dispatcher: Arc<SyncDispatcher>,
    pub store: CheckpointStore,
    _dir: tempfile::TempDir,
}

/// Wire a ScanManager over fakes, with a merge sink backed by an accepting
/// transport and jitter disabled.
pub fn harness(queries: Vec<&str>, search: Arc<FakeSearch>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = Arc::new(Config {
        data_dir: dir.path().join("data"),
        no_jitter: true,
        ..Config::default()
    });

    let store = CheckpointStore::new(dir.path().join("data/checkpoint.json"));
    let checkpoint = Arc::new(Mutex::new(Checkpoint::default()));
    let reports = Arc::new(ReportWriter::new(&config.data_dir));
    reports.check().unwrap();

    let dispatcher = Arc::new(SyncDispatcher::new(
        checkpoint.clone(),
        store.clone(),
        reports.clone(),
        Some(MergeListSink::new(Box::new(AcceptingMergeTransport), true)),
        None,
    ));

    let manager = ScanManager::new(
        config,
        queries.into_iter().map(str::to_string).collect(),
        search as Arc<dyn SearchProvider>,
        Arc::new(AlwaysValid),
        checkpoint.clone(),
        store.clone(),
        dispatcher.clone(),
        reports,
        None,
    )
    .unwrap();

    Harness {
        manager,
        checkpoint,
        dispatcher,
        store,
        _dir: dir,
    }
}
