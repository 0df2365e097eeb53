//! Per-key delivery bookkeeping

/// Outcome recorded for one key in one flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Confirmed present at the sink
    Ok,
    /// The write completed but this key was absent from the verified list
    UpdateFailed,
    /// Bulk delivery where some groups failed; per-key granularity is not
    /// available, so every key in the batch carries the failure count
    PartialFailure { failed_groups: usize },
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Ok => write!(f, "ok"),
            DeliveryOutcome::UpdateFailed => write!(f, "update_failed"),
            DeliveryOutcome::PartialFailure { failed_groups } => {
                write!(f, "partial_failure_{}_groups", failed_groups)
            }
        }
    }
}

/// Result of flushing one sink's pending set
#[derive(Debug, Clone, Default)]
pub struct FlushReport {
    /// One outcome per key that took part in the flush
    pub outcomes: Vec<(String, DeliveryOutcome)>,
    /// Whether the pending set may be cleared
    pub success: bool,
}

impl FlushReport {
    pub fn all_ok(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            outcomes: keys
                .into_iter()
                .map(|key| (key, DeliveryOutcome::Ok))
                .collect(),
            success: true,
        }
    }

    /// Outcome pairs rendered for the send-result report file
    pub fn rendered(&self) -> Vec<(String, String)> {
        self.outcomes
            .iter()
            .map(|(key, outcome)| (key.clone(), outcome.to_string()))
            .collect()
    }
}
