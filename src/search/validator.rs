//! Candidate-key validation against the issuing provider
//!
//! A candidate is probed with a minimal chat-completions request. The
//! verdict is a closed enumeration: downstream routing depends on keeping
//! "confirmed invalid", "rate-limited (unconfirmed)" and "transient/unknown"
//! distinct.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Validation outcome for one candidate key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Key is live
    Ok,
    /// Key is dead (provider rejected the credential)
    Unauthorized,
    /// Key is dead (provider reports it disabled)
    Disabled,
    /// Key may be valid; provider is throttling, validity unconfirmed
    RateLimited,
    /// Some other non-success HTTP status
    Http(u16),
    /// Transport-level failure (timeout, connect error)
    Transient(String),
}

impl Verdict {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => Verdict::Ok,
            401 => Verdict::Unauthorized,
            403 => Verdict::Disabled,
            429 => Verdict::RateLimited,
            other => Verdict::Http(other),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Ok)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Verdict::RateLimited)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Ok => write!(f, "ok"),
            Verdict::Unauthorized => write!(f, "unauthorized"),
            Verdict::Disabled => write!(f, "disabled"),
            Verdict::RateLimited => write!(f, "rate_limited"),
            Verdict::Http(status) => write!(f, "http_{}", status),
            Verdict::Transient(class) => write!(f, "transient_{}", class),
        }
    }
}

/// Validates one candidate key. Transport failures surface as
/// [`Verdict::Transient`], never as an error.
#[async_trait]
pub trait KeyValidator: Send + Sync {
    async fn validate(&self, candidate: &str) -> Verdict;
}

/// HTTP validator probing a chat-completions style endpoint
pub struct HttpKeyValidator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    jitter: bool,
}

impl HttpKeyValidator {
    pub fn new(endpoint: String, model: String, jitter: bool) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            model,
            jitter,
        })
    }
}

#[async_trait]
impl KeyValidator for HttpKeyValidator {
    async fn validate(&self, candidate: &str) -> Verdict {
        if self.jitter {
            // Short randomized delay to avoid bursting the provider
            let millis = rand::rng().random_range(500..1500);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }

        let body = serde_json::json!({
            "messages": [{"role": "user", "content": "hi"}],
            "model": self.model,
            "max_tokens": 5,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(candidate)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(response) => Verdict::from_status(response.status().as_u16()),
            Err(e) => {
                let class = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                Verdict::Transient(class.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(Verdict::from_status(200), Verdict::Ok);
        assert_eq!(Verdict::from_status(401), Verdict::Unauthorized);
        assert_eq!(Verdict::from_status(403), Verdict::Disabled);
        assert_eq!(Verdict::from_status(429), Verdict::RateLimited);
        assert_eq!(Verdict::from_status(500), Verdict::Http(500));
    }

    #[test]
    fn test_only_ok_is_valid() {
        assert!(Verdict::Ok.is_valid());
        assert!(!Verdict::RateLimited.is_valid());
        assert!(!Verdict::Unauthorized.is_valid());
        assert!(!Verdict::Transient("timeout".to_string()).is_valid());
    }

    #[test]
    fn test_display_form_is_stable() {
        // The display form lands in the send-result report files
        assert_eq!(Verdict::RateLimited.to_string(), "rate_limited");
        assert_eq!(Verdict::Http(502).to_string(), "http_502");
        assert_eq!(
            Verdict::Transient("timeout".to_string()).to_string(),
            "transient_timeout"
        );
    }
}
