//! Sync dispatcher
//!
//! Owns delivery of confirmed-valid keys to the configured sinks. Keys are
//! enqueued into per-sink pending sets inside the checkpoint (and persisted
//! immediately, so a crash between enqueue and flush loses nothing); a
//! recurring timer flushes every enabled sink that has pending keys.
//!
//! The checkpoint mutex is held for the duration of a flush, including the
//! sink sends. That serializes enqueue against clear-on-success: a key
//! enqueued mid-flush can never be dropped without having been sent.

use crate::checkpoint::{Checkpoint, CheckpointStore, SinkId};
use crate::output::ReportWriter;
use crate::sync::{GroupedAppendSink, MergeListSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

pub struct SyncDispatcher {
    checkpoint: Arc<Mutex<Checkpoint>>,
    store: CheckpointStore,
    reports: Arc<ReportWriter>,
    merge: Option<MergeListSink>,
    grouped: Option<GroupedAppendSink>,
}

impl SyncDispatcher {
    pub fn new(
        checkpoint: Arc<Mutex<Checkpoint>>,
        store: CheckpointStore,
        reports: Arc<ReportWriter>,
        merge: Option<MergeListSink>,
        grouped: Option<GroupedAppendSink>,
    ) -> Self {
        if merge.is_none() {
            log::warn!("Merge sink disabled - not configured");
        }
        if grouped.is_none() {
            log::warn!("Grouped sink disabled - not configured");
        }
        Self {
            checkpoint,
            store,
            reports,
            merge,
            grouped,
        }
    }

    pub fn has_sinks(&self) -> bool {
        self.merge.is_some() || self.grouped.is_some()
    }

    /// Add keys to every enabled sink's pending set (set union, idempotent)
    /// and persist the checkpoint so the keys survive a crash.
    pub async fn enqueue(&self, keys: &[String]) {
        if keys.is_empty() || !self.has_sinks() {
            return;
        }

        let mut checkpoint = self.checkpoint.lock().await;
        if self.merge.is_some() {
            let added = checkpoint.enqueue_pending(SinkId::MergeList, keys);
            log::info!(
                "Added {} key(s) to merge sink queue (total: {})",
                added,
                checkpoint.pending_count(SinkId::MergeList)
            );
        }
        if self.grouped.is_some() {
            let added = checkpoint.enqueue_pending(SinkId::GroupedAppend, keys);
            log::info!(
                "Added {} key(s) to grouped sink queue (total: {})",
                added,
                checkpoint.pending_count(SinkId::GroupedAppend)
            );
        }

        if let Err(e) = self.store.save(&checkpoint) {
            log::error!("Checkpoint persist after enqueue failed: {}", e);
        }
    }

    /// Flush every enabled sink with pending keys. Failures leave the
    /// pending set intact for the next cycle (at-least-once delivery).
    pub async fn flush_all(&self) {
        let mut checkpoint = self.checkpoint.lock().await;

        if let Some(sink) = &self.merge {
            let keys = checkpoint.pending_keys(SinkId::MergeList);
            if !keys.is_empty() {
                match sink.flush(&keys).await {
                    Ok(report) => {
                        if let Err(e) = self
                            .reports
                            .save_send_results(&SinkId::MergeList.to_string(), &report.rendered())
                        {
                            log::error!("Send-result report write failed: {}", e);
                        }
                        if report.success {
                            checkpoint.clear_pending(SinkId::MergeList);
                            log::info!("Merge sink queue processed successfully");
                        }
                    }
                    Err(e) => log::warn!("Merge sink flush failed, will retry: {}", e),
                }
            }
        }

        if let Some(sink) = &self.grouped {
            let keys = checkpoint.pending_keys(SinkId::GroupedAppend);
            if !keys.is_empty() {
                match sink.flush(&keys).await {
                    Ok(report) => {
                        if let Err(e) = self.reports.save_send_results(
                            &SinkId::GroupedAppend.to_string(),
                            &report.rendered(),
                        ) {
                            log::error!("Send-result report write failed: {}", e);
                        }
                        if report.success {
                            checkpoint.clear_pending(SinkId::GroupedAppend);
                            log::info!("Grouped sink queue processed successfully");
                        }
                    }
                    Err(e) => log::warn!("Grouped sink flush failed, will retry: {}", e),
                }
            }
        }

        if let Err(e) = self.store.save(&checkpoint) {
            log::error!("Checkpoint persist after flush failed: {}", e);
        }
    }

    /// Run the recurring flush cycle until shutdown, then drain once more.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.flush_all().await;
                    }
                    _ = shutdown_rx.recv() => {
                        log::info!("Sync dispatcher draining final flush before shutdown");
                        self.flush_all().await;
                        break;
                    }
                }
            }
            log::info!("Sync dispatcher stopped");
        })
    }
}
