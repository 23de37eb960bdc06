//! Outbound HTTP for lookups.
//!
//! Activities talk to upstreams through `HttpGetter` so tests can substitute
//! a canned transport.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::activity::ActivityError;
use crate::config::{ConfigError, LookupConfig};
use crate::resilience::timeouts::DeadlineExceeded;

/// Lookup failures, classified for the retry loop by `From<LookupError> for ActivityError`.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("lookup rejected for {query}: {message}")]
    Rejected { query: String, message: String },

    #[error("invalid IP address {0:?}")]
    InvalidIp(String),

    #[error(transparent)]
    Deadline(#[from] DeadlineExceeded),
}

impl From<LookupError> for ActivityError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Rejected { .. } | LookupError::InvalidIp(_) => ActivityError::fatal(err),
            LookupError::Transport { .. }
            | LookupError::Status { .. }
            | LookupError::Decode { .. }
            | LookupError::Deadline(_) => ActivityError::transient(err),
        }
    }
}

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpGetter: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, LookupError>;
}

/// `HttpGetter` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestGetter {
    client: reqwest::Client,
}

impl ReqwestGetter {
    pub fn new(config: &LookupConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpGetter for ReqwestGetter {
    async fn get(&self, url: &str) -> Result<HttpResponse, LookupError> {
        let transport = |e: reqwest::Error| LookupError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        tracing::debug!(url = %url, status, bytes = body.len(), "Lookup response received");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::Retryable;

    #[test]
    fn test_classification() {
        let transient = [
            LookupError::Transport { url: "u".into(), reason: "reset".into() },
            LookupError::Status { url: "u".into(), status: 503 },
            LookupError::Decode { url: "u".into(), reason: "eof".into() },
            LookupError::Deadline(DeadlineExceeded(Duration::from_secs(1))),
        ];
        for err in transient {
            assert!(ActivityError::from(err).is_retryable());
        }

        let fatal = [
            LookupError::Rejected { query: "10.0.0.1".into(), message: "private range".into() },
            LookupError::InvalidIp("not-an-ip".into()),
        ];
        for err in fatal {
            assert!(!ActivityError::from(err).is_retryable());
        }
    }

    #[test]
    fn test_success_range() {
        let ok = HttpResponse { status: 204, body: String::new() };
        let not_found = HttpResponse { status: 404, body: String::new() };
        assert!(ok.is_success());
        assert!(!not_found.is_success());
    }
}
