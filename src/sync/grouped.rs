//! Grouped-append sink
//!
//! The sink organizes keys under named groups. Group names resolve to opaque
//! ids through a listing call, cached with a bounded TTL. Each flush submits
//! the whole pending batch to every configured group as one bulk append;
//! per-key, per-group granularity is not available on this transport, so a
//! flush with any failed group records a partial-failure outcome for every
//! key in the batch and keeps the batch pending for retry.

use super::outcome::{DeliveryOutcome, FlushReport};
use super::SyncError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const GROUP_ID_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

/// One named group at the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// Transport seam for the grouped sink
#[async_trait]
pub trait GroupTransport: Send + Sync {
    /// List all groups at the sink
    async fn list_groups(&self) -> Result<Vec<Group>, SyncError>;
    /// Bulk-append keys to one group
    async fn add_keys(&self, group_id: i64, keys_text: &str) -> Result<(), SyncError>;
}

pub struct GroupedAppendSink {
    transport: Box<dyn GroupTransport>,
    group_names: Vec<String>,
    cache: Mutex<HashMap<String, (i64, Instant)>>,
    cache_ttl: Duration,
}

impl GroupedAppendSink {
    pub fn new(transport: Box<dyn GroupTransport>, group_names: Vec<String>) -> Self {
        Self {
            transport,
            group_names,
            cache: Mutex::new(HashMap::new()),
            cache_ttl: GROUP_ID_CACHE_TTL,
        }
    }

    #[cfg(test)]
    fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Resolve a group name to its id, consulting the TTL cache first.
    /// Returns `None` when the sink has no group by that name or the listing
    /// call failed; the caller records the group as failed and moves on.
    async fn resolve_group_id(&self, group_name: &str) -> Option<i64> {
        {
            let cache = self.cache.lock().await;
            if let Some((id, cached_at)) = cache.get(group_name) {
                if cached_at.elapsed() < self.cache_ttl {
                    return Some(*id);
                }
            }
        }

        let groups = match self.transport.list_groups().await {
            Ok(groups) => groups,
            Err(e) => {
                log::warn!("Group listing failed: {}", e);
                return None;
            }
        };

        let id = groups
            .into_iter()
            .find(|group| group.name == group_name)
            .map(|group| group.id)?;

        self.cache
            .lock()
            .await
            .insert(group_name.to_string(), (id, Instant::now()));
        Some(id)
    }

    /// Deliver the batch to every configured group.
    ///
    /// All groups succeeding records every key ok; any failed group records
    /// a partial-failure outcome for every key in the batch.
    pub async fn flush(&self, keys: &[String]) -> Result<FlushReport, SyncError> {
        let keys_text = keys.join(",");
        let mut failed_groups = 0usize;

        for group_name in &self.group_names {
            let Some(group_id) = self.resolve_group_id(group_name).await else {
                log::error!("Cannot resolve group '{}', marking failed", group_name);
                failed_groups += 1;
                continue;
            };

            match self.transport.add_keys(group_id, &keys_text).await {
                Ok(()) => {
                    log::info!(
                        "Appended {} key(s) to group '{}' ({})",
                        keys.len(),
                        group_name,
                        group_id
                    );
                }
                Err(e) => {
                    log::error!("Append to group '{}' failed: {}", group_name, e);
                    failed_groups += 1;
                }
            }
        }

        if failed_groups == 0 {
            Ok(FlushReport::all_ok(keys.to_vec()))
        } else {
            Ok(FlushReport {
                outcomes: keys
                    .iter()
                    .map(|key| {
                        (
                            key.clone(),
                            DeliveryOutcome::PartialFailure { failed_groups },
                        )
                    })
                    .collect(),
                success: false,
            })
        }
    }
}

/// HTTP transport for the grouped sink (bearer auth)
pub struct HttpGroupTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl HttpGroupTransport {
    pub fn new(base_url: &str, auth_token: String) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("keysweep/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: crate::core::config::normalize_base_url(base_url),
            auth_token,
        })
    }
}

#[async_trait]
impl GroupTransport for HttpGroupTransport {
    async fn list_groups(&self) -> Result<Vec<Group>, SyncError> {
        let response = self
            .client
            .get(format!("{}/api/groups", self.base_url))
            .bearer_auth(&self.auth_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                context: "group listing",
                status: response.status().as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let code = body.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);
        if code != 0 {
            return Err(SyncError::Api { code });
        }

        let data = body
            .get("data")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SyncError::UnexpectedBody("missing data array".to_string()))?;
        Ok(data
            .iter()
            .filter_map(|entry| {
                Some(Group {
                    id: entry.get("id")?.as_i64()?,
                    name: entry.get("name")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn add_keys(&self, group_id: i64, keys_text: &str) -> Result<(), SyncError> {
        let payload = serde_json::json!({
            "group_id": group_id,
            "keys_text": keys_text,
        });
        let response = self
            .client
            .post(format!("{}/api/keys/add-async", self.base_url))
            .bearer_auth(&self.auth_token)
            .json(&payload)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Status {
                context: "bulk key append",
                status: response.status().as_u16(),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let code = body.get("code").and_then(|v| v.as_i64()).unwrap_or(-1);
        if code != 0 {
            return Err(SyncError::Api { code });
        }
        Ok(())
    }
}
