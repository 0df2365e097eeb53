//! Merge-based sink
//!
//! The sink's state is one replaceable configuration object holding a full
//! key list, so delivery is read-modify-write: fetch the current list, union
//! in the genuinely new keys, write the whole object back, then verify every
//! intended key is present. Verification makes delivery failure observable
//! per key even though the transport is list-level.

use super::outcome::{DeliveryOutcome, FlushReport};
use super::SyncError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Duration;

const KEYS_FIELD: &str = "API_KEYS";

/// Transport seam for the merge sink's config object
#[async_trait]
pub trait MergeTransport: Send + Sync {
    /// Fetch the full configuration object
    async fn get_config(&self) -> Result<serde_json::Value, SyncError>;
    /// Replace the configuration object; returns the response body
    async fn put_config(&self, config: &serde_json::Value) -> Result<serde_json::Value, SyncError>;
}

pub struct MergeListSink {
    transport: Box<dyn MergeTransport>,
    /// Whether the PUT response echoes the final key list; when false a
    /// follow-up GET performs the verification read
    echoes_keys: bool,
}

fn keys_of(config: &serde_json::Value) -> Vec<String> {
    config
        .get(KEYS_FIELD)
        .and_then(|v| v.as_array())
        .map(|array| {
            array
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

impl MergeListSink {
    pub fn new(transport: Box<dyn MergeTransport>, echoes_keys: bool) -> Self {
        Self {
            transport,
            echoes_keys,
        }
    }

    /// Deliver `keys`, returning a per-key outcome report.
    ///
    /// When the remote list already contains every pending key the flush is
    /// a no-op: zero writes, all keys reported ok.
    pub async fn flush(&self, keys: &[String]) -> Result<FlushReport, SyncError> {
        log::info!("Sending {} key(s) to merge sink...", keys.len());

        let mut config = self.transport.get_config().await?;
        let current: BTreeSet<String> = keys_of(&config).into_iter().collect();

        let new_keys: Vec<String> = keys
            .iter()
            .filter(|key| !current.contains(*key))
            .cloned()
            .collect();

        if new_keys.is_empty() {
            log::info!("All {} key(s) already exist in merge sink", keys.len());
            return Ok(FlushReport::all_ok(keys.to_vec()));
        }

        let mut merged = current.clone();
        merged.extend(new_keys.iter().cloned());
        let merged_keys = serde_json::Value::Array(
            merged
                .iter()
                .map(|key| serde_json::Value::String(key.clone()))
                .collect(),
        );
        match config.as_object_mut() {
            Some(object) => {
                object.insert(KEYS_FIELD.to_string(), merged_keys);
            }
            None => {
                // A non-object body is a sink fault, not ours; the pending
                // set stays intact for the next cycle
                return Err(SyncError::UnexpectedBody(
                    "merge sink config is not a JSON object".to_string(),
                ));
            }
        }

        log::info!(
            "Updating merge sink config with {} new key(s)...",
            new_keys.len()
        );
        let response = self.transport.put_config(&config).await?;

        let verified: BTreeSet<String> = if self.echoes_keys {
            keys_of(&response).into_iter().collect()
        } else {
            // The sink does not echo; a read-after-write verifies instead
            keys_of(&self.transport.get_config().await?)
                .into_iter()
                .collect()
        };

        let mut report = FlushReport::default();
        let mut failed = 0usize;
        for key in keys {
            let outcome = if verified.contains(key) || current.contains(key) {
                DeliveryOutcome::Ok
            } else {
                failed += 1;
                DeliveryOutcome::UpdateFailed
            };
            report.outcomes.push((key.clone(), outcome));
        }
        report.success = failed == 0;

        if report.success {
            log::info!(
                "All {} new key(s) successfully added to merge sink",
                new_keys.len()
            );
        } else {
            log::error!("Failed to add {} key(s) to merge sink", failed);
        }
        Ok(report)
    }
}

/// HTTP transport for the merge sink (session-cookie auth)
pub struct HttpMergeTransport {
    client: reqwest::Client,
    config_url: String,
    auth_token: String,
}

impl HttpMergeTransport {
    pub fn new(base_url: &str, auth_token: String) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("keysweep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            config_url: format!(
                "{}/api/config",
                crate::core::config::normalize_base_url(base_url)
            ),
            auth_token,
        })
    }

    fn cookie(&self) -> String {
        format!("auth_token={}", self.auth_token)
    }
}

#[async_trait]
impl MergeTransport for HttpMergeTransport {
    async fn get_config(&self) -> Result<serde_json::Value, SyncError> {
        let response = self
            .client
            .get(&self.config_url)
            .header("Cookie", self.cookie())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                context: "merge sink config fetch",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn put_config(&self, config: &serde_json::Value) -> Result<serde_json::Value, SyncError> {
        let response = self
            .client
            .put(&self.config_url)
            .header("Cookie", self.cookie())
            .json(config)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                context: "merge sink config update",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
