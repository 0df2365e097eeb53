//! Scan loop
//!
//! Drives the pipeline: iterate queries, filter items, triage content,
//! update the checkpoint, enqueue valid keys into the sync dispatcher.
//! One iteration failure never kills the process; errors are caught at the
//! loop boundary, logged, and followed by a fixed backoff.

use crate::checkpoint::{Checkpoint, CheckpointStore, StoreError};
use crate::core::config::Config;
use crate::core::shutdown::ShutdownCoordinator;
use crate::notifications::SummaryNotifier;
use crate::output::ReportWriter;
use crate::scanner::filter::{should_skip, SkipStats};
use crate::scanner::query::normalize_query;
use crate::scanner::triage::{triage, KeyExtractor};
use crate::search::{KeyValidator, ResultItem, SearchProvider};
use crate::sync::SyncDispatcher;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Backoff after a failed pass before the loop continues
const PASS_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum PassError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for one completed pass
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSummary {
    pub queries_run: usize,
    pub items_processed: usize,
    pub valid_keys: usize,
    pub rate_limited_keys: usize,
    pub skip_stats: SkipStats,
}

pub struct ScanManager {
    config: Arc<Config>,
    queries: Vec<String>,
    search: Arc<dyn SearchProvider>,
    validator: Arc<dyn KeyValidator>,
    extractor: KeyExtractor,
    checkpoint: Arc<Mutex<Checkpoint>>,
    store: CheckpointStore,
    dispatcher: Arc<SyncDispatcher>,
    reports: Arc<ReportWriter>,
    notifier: Option<Arc<SummaryNotifier>>,
}

impl ScanManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        queries: Vec<String>,
        search: Arc<dyn SearchProvider>,
        validator: Arc<dyn KeyValidator>,
        checkpoint: Arc<Mutex<Checkpoint>>,
        store: CheckpointStore,
        dispatcher: Arc<SyncDispatcher>,
        reports: Arc<ReportWriter>,
        notifier: Option<Arc<SummaryNotifier>>,
    ) -> Result<Self, regex::Error> {
        let extractor = KeyExtractor::new(&config.key_pattern)?;
        Ok(Self {
            config,
            queries,
            search,
            validator,
            extractor,
            checkpoint,
            store,
            dispatcher,
            reports,
            notifier,
        })
    }

    /// Run scan passes until shutdown is requested. The only cancellation
    /// point is between passes; an in-flight pass runs to completion.
    pub async fn run(&self, shutdown: &ShutdownCoordinator) {
        let mut shutdown_rx = shutdown.subscribe();
        let mut pass = 0u64;
        let mut last_summary = tokio::time::Instant::now();

        loop {
            if shutdown.is_shutdown_requested() {
                break;
            }
            pass += 1;
            log::info!("Scan pass #{} starting", pass);

            match self.run_pass().await {
                Ok(summary) => {
                    log::info!(
                        "Scan pass #{} done: {} queries, {} items processed, {} valid, {} rate limited, skipped [{}]",
                        pass,
                        summary.queries_run,
                        summary.items_processed,
                        summary.valid_keys,
                        summary.rate_limited_keys,
                        summary.skip_stats
                    );
                }
                Err(e) => {
                    log::error!("Scan pass #{} failed: {}", pass, e);
                    tokio::time::sleep(PASS_FAILURE_BACKOFF).await;
                }
            }

            if let Some(notifier) = &self.notifier {
                if last_summary.elapsed() >= Duration::from_secs(self.config.summary_interval_secs)
                {
                    notifier.send_summary().await;
                    last_summary = tokio::time::Instant::now();
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(self.config.loop_delay_secs)) => {}
                _ = shutdown_rx.recv() => break,
            }
        }

        log::info!("Scan loop stopped after {} pass(es)", pass);
    }

    /// Execute one full pass over the configured query list.
    pub async fn run_pass(&self) -> Result<PassSummary, PassError> {
        let mut summary = PassSummary::default();

        // Per-pass query dedup resets exactly once, here
        self.checkpoint.lock().await.begin_pass();

        for (query_index, query) in self.queries.iter().enumerate() {
            let normalized = normalize_query(query);
            if self.checkpoint.lock().await.is_query_processed(&normalized) {
                continue;
            }

            match self.search.search(query).await {
                Ok(Some(results)) => {
                    let (valid, rate_limited) = self.scan_items(&results.items, &mut summary).await?;
                    summary.valid_keys += valid;
                    summary.rate_limited_keys += rate_limited;
                    log::info!(
                        "Query {}/{}: found {} valid key(s)",
                        query_index + 1,
                        self.queries.len(),
                        valid
                    );
                }
                Ok(None) => {
                    log::warn!("Search produced no usable response for query, deferring");
                }
                Err(e) => {
                    log::warn!("Search failed for query, deferring to next pass: {}", e);
                }
            }

            {
                let mut checkpoint = self.checkpoint.lock().await;
                checkpoint.mark_query_processed(&normalized);
                checkpoint.update_scan_time(Utc::now());
                self.store.save(&checkpoint)?;
            }
            summary.queries_run += 1;
        }

        Ok(summary)
    }

    /// Filter and triage one query's result items in page order.
    async fn scan_items(
        &self,
        items: &[ResultItem],
        summary: &mut PassSummary,
    ) -> Result<(usize, usize), PassError> {
        let mut valid = 0;
        let mut rate_limited = 0;

        for (item_index, item) in items.iter().enumerate() {
            if (item_index + 1) % self.config.checkpoint_interval_items == 0 {
                let checkpoint = self.checkpoint.lock().await;
                self.store.save(&checkpoint)?;
            }

            let skip = {
                let checkpoint = self.checkpoint.lock().await;
                should_skip(
                    item,
                    &checkpoint,
                    self.config.date_range_days,
                    &self.config.file_path_blacklist,
                    Utc::now(),
                )
            };
            if let Some(reason) = skip {
                log::debug!("Skipping {} ({})", item.path, reason);
                summary.skip_stats.record(reason);
                continue;
            }

            let (item_valid, item_rate_limited) = self.process_item(item).await;
            valid += item_valid;
            rate_limited += item_rate_limited;

            self.checkpoint.lock().await.add_scanned_sha(&item.sha);
            summary.items_processed += 1;
        }

        Ok((valid, rate_limited))
    }

    /// Fetch, triage, persist and enqueue for one item. Returns the valid
    /// and rate-limited counts; a failed fetch short-circuits to zero.
    async fn process_item(&self, item: &ResultItem) -> (usize, usize) {
        if !self.config.no_jitter {
            // Spread fetches out to stay under the content host's radar
            let millis = rand::rng().random_range(1000..4000);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let content = match self.search.fetch_content(item).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                log::warn!("Failed to fetch content for file: {}", item.html_url);
                return (0, 0);
            }
            Err(e) => {
                log::warn!("Content fetch error for {}: {}", item.html_url, e);
                return (0, 0);
            }
        };

        let outcome = triage(&self.extractor, self.validator.as_ref(), &content).await;

        if !outcome.valid.is_empty() {
            if let Err(e) = self.reports.save_valid_keys(
                &item.repo_full_name,
                &item.path,
                &item.html_url,
                &outcome.valid,
            ) {
                log::error!("Valid-key report write failed: {}", e);
            }
            if let Some(notifier) = &self.notifier {
                notifier.queue_keys(&outcome.valid).await;
            }
            self.dispatcher.enqueue(&outcome.valid).await;
        }

        if !outcome.rate_limited.is_empty() {
            if let Err(e) = self.reports.save_rate_limited_keys(
                &item.repo_full_name,
                &item.path,
                &item.html_url,
                &outcome.rate_limited,
            ) {
                log::error!("Rate-limited report write failed: {}", e);
            }
        }

        (outcome.valid.len(), outcome.rate_limited.len())
    }
}
