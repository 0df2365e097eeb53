//! Best-effort summary notifications
//!
//! Newly confirmed-valid keys accumulate in memory and are delivered as a
//! periodic summary over a Telegram-style sendMessage channel. Delivery is
//! best-effort: failures are logged and the batch is dropped, never retried.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Message bodies longer than this are split into sequential parts
const MAX_MESSAGE_LENGTH: usize = 3500;
const INTER_PART_DELAY: Duration = Duration::from_secs(1);

/// Split an over-long message into parts of at most `max_len` characters.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }
    chars
        .chunks(max_len)
        .map(|chunk| chunk.iter().collect())
        .collect()
}

pub struct SummaryNotifier {
    client: reqwest::Client,
    send_url: String,
    chat_id: String,
    pending: Mutex<Vec<String>>,
}

impl SummaryNotifier {
    pub fn new(bot_token: &str, chat_id: String) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            send_url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id,
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Queue newly found valid keys for the next summary
    pub async fn queue_keys(&self, keys: &[String]) {
        self.pending.lock().await.extend(keys.iter().cloned());
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Send the accumulated summary and reset the queue. A send failure
    /// still resets the queue; this channel is best-effort only.
    pub async fn send_summary(&self) {
        let keys = {
            let mut pending = self.pending.lock().await;
            std::mem::take(&mut *pending)
        };
        if keys.is_empty() {
            return;
        }

        let mut message = format!(
            "Scan summary\ntime: {}\nnew valid keys: {}\n\n",
            Utc::now().format("%m-%d %H:%M"),
            keys.len()
        );
        message.push_str(&keys.join("\n"));

        let parts = split_message(&message, MAX_MESSAGE_LENGTH);
        let total = parts.len();
        for (index, part) in parts.into_iter().enumerate() {
            let text = if total > 1 {
                format!("part {}/{}:\n\n{}", index + 1, total, part)
            } else {
                part
            };
            let payload = serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
            });
            match self.client.post(&self.send_url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    log::error!("Summary send failed: HTTP {}", response.status());
                }
                Err(e) => {
                    log::error!("Summary send failed: {}", e);
                }
            }
            if total > 1 {
                tokio::time::sleep(INTER_PART_DELAY).await;
            }
        }

        log::info!("Sent summary report with {} key(s)", keys.len());
    }
}
