//! HTTP message bridge.
//!
//! The bridge accepts `POST {base}/topics/{topic}` with a JSON records
//! envelope and answers with an HTTP status. Only 200 counts as delivered.

use super::envelope::KAFKA_JSON_V2;
use super::error::PublishError;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;

/// Request never produced a usable response (connect error, timeout,
/// unreadable body).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Destination for serialized batches.
pub trait Bridge: Send + Sync {
    /// Full URL batches are posted to.
    fn endpoint(&self) -> &str;

    /// Post one request body and return the response status code.
    fn post(&self, body: &[u8]) -> Result<u16, TransportError>;
}

/// `{base}/topics/{topic}`, tolerating a trailing slash on `base`.
pub fn topic_endpoint(base: &str, topic: &str) -> String {
    format!("{}/topics/{topic}", base.trim_end_matches('/'))
}

/// Bridge backed by a blocking reqwest client.
pub struct HttpBridge {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpBridge {
    pub fn new(base: &str, topic: &str, timeout: Duration) -> Result<Self, PublishError> {
        let endpoint = topic_endpoint(base, topic);
        reqwest::Url::parse(&endpoint)
            .map_err(|e| PublishError::Client(format!("invalid endpoint '{endpoint}': {e}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Client(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }
}

impl Bridge for HttpBridge {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, body: &[u8]) -> Result<u16, TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, KAFKA_JSON_V2)
            .body(body.to_vec())
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = resp.status().as_u16();
        // Drain the body so the pooled connection can be reused
        resp.bytes()
            .map_err(|e| TransportError(format!("unreadable response body: {e}")))?;

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_base_and_topic() {
        assert_eq!(
            topic_endpoint("http://bridge:8080", "tx-sim"),
            "http://bridge:8080/topics/tx-sim"
        );
        assert_eq!(
            topic_endpoint("http://bridge:8080/", "tx-fraud-sim"),
            "http://bridge:8080/topics/tx-fraud-sim"
        );
    }

    #[test]
    fn rejects_unparseable_base() {
        let err = HttpBridge::new("not a url", "tx-sim", Duration::from_secs(1)).err();
        assert!(matches!(err, Some(PublishError::Client(_))));
    }
}
