//! Ledger Gateway Client
//!
//! Talks to a JSON gateway in front of the ledger contract. The gateway
//! owns signing, nonces and confirmation waits; this client only maps its
//! responses onto the anchor/fetch contract.
//!
//! - `PUT  {gateway}/anchors/{id}` with `{"digest": "<hex>"}`
//! - `GET  {gateway}/anchors/{id}` returning `{"digest": "<hex>"}`, or 404
//!   when the id was never anchored

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::database::RecordId;
use crate::error::{AuditError, Result};
use crate::fingerprint::Digest;
use crate::ledger::{AnchorReceipt, Ledger};

#[derive(Debug, Serialize)]
struct AnchorWriteRequest {
    digest: String,
}

#[derive(Debug, Deserialize)]
struct AnchorWriteResponse {
    tx_hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnchorReadResponse {
    digest: String,
}

pub struct HttpLedgerClient {
    gateway_url: String,
    http_client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpLedgerClient {
    /// Create new gateway client; every request is bounded by `request_timeout`
    pub fn new(gateway_url: String, request_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AuditError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            http_client,
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        })
    }

    pub fn with_retry(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn gateway_url(&self) -> &str {
        &self.gateway_url
    }

    fn anchor_url(&self, id: RecordId) -> String {
        format!("{}/anchors/{}", self.gateway_url, id)
    }

    async fn put_anchor_once(&self, id: RecordId, digest: Digest) -> Result<AnchorReceipt> {
        let response = self
            .http_client
            .put(self.anchor_url(id))
            .json(&AnchorWriteRequest {
                digest: digest.to_hex(),
            })
            .send()
            .await
            .map_err(|e| AuditError::LedgerUnavailable(format!("anchor write for {}: {}", id, e)))?;

        let status = response.status();
        if status.is_success() {
            // The write is confirmed even if the body is not what we expect.
            let tx_ref = response
                .json::<AnchorWriteResponse>()
                .await
                .ok()
                .and_then(|body| body.tx_hash);
            return Ok(AnchorReceipt::new(id, digest, tx_ref));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, format!("anchor write for {}: {} {}", id, status, body)))
    }
}

/// 4xx is permanent except for timeouts and rate limiting
fn classify_failure(status: StatusCode, message: String) -> AuditError {
    let transient = status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS;

    if transient {
        AuditError::LedgerUnavailable(message)
    } else {
        AuditError::LedgerRejected(message)
    }
}

#[async_trait]
impl Ledger for HttpLedgerClient {
    async fn anchor(&self, id: RecordId, digest: Digest) -> Result<AnchorReceipt> {
        let mut attempt = 0u32;
        loop {
            match self.put_anchor_once(id, digest).await {
                Ok(receipt) => {
                    debug!(
                        "Gateway confirmed anchor for record {} (tx: {})",
                        id,
                        receipt.tx_ref.as_deref().unwrap_or("unknown")
                    );
                    return Ok(receipt);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "Anchor write for record {} failed (attempt {}/{}): {}",
                        id,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch(&self, id: RecordId) -> Result<Digest> {
        debug!("Fetching anchor for record {}", id);

        let response = self
            .http_client
            .get(self.anchor_url(id))
            .send()
            .await
            .map_err(|e| AuditError::LedgerUnavailable(format!("anchor read for {}: {}", id, e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Digest::SENTINEL);
        }

        if !status.is_success() {
            return Err(AuditError::LedgerUnavailable(format!(
                "anchor read for {}: {}",
                id, status
            )));
        }

        let body: AnchorReadResponse = response.json().await.map_err(|e| {
            AuditError::LedgerUnavailable(format!("anchor read for {}: bad body: {}", id, e))
        })?;

        body.digest.parse::<Digest>().map_err(|e| {
            AuditError::LedgerUnavailable(format!("anchor read for {}: {}", id, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpLedgerClient {
        HttpLedgerClient::new(format!("{}/", server.uri()), Duration::from_millis(200))
            .unwrap()
            .with_retry(2, Duration::from_millis(1))
    }

    fn digest() -> Digest {
        Digest::from_bytes([0xab; 32])
    }

    #[tokio::test]
    async fn test_fetch_anchored_digest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anchors/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "digest": digest().to_hex() })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).fetch(1).await.unwrap(), digest());
    }

    #[tokio::test]
    async fn test_fetch_never_anchored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anchors/5"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(client(&server).fetch(5).await.unwrap().is_sentinel());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anchors/2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "digest": digest().to_hex() }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = client(&server).fetch(2).await.unwrap_err();
        assert!(matches!(err, AuditError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_digest_is_not_a_digest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anchors/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "digest": "0xdeadbeef" })))
            .mount(&server)
            .await;

        let err = client(&server).fetch(3).await.unwrap_err();
        assert!(matches!(err, AuditError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_anchor_sends_hex_digest() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/anchors/1"))
            .and(body_json(json!({ "digest": digest().to_hex() })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tx_hash": "0xfeed" })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = client(&server).anchor(1, digest()).await.unwrap();
        assert_eq!(receipt.record_id, 1);
        assert_eq!(receipt.digest, digest());
        assert_eq!(receipt.tx_ref.as_deref(), Some("0xfeed"));
    }

    #[tokio::test]
    async fn test_anchor_retries_transient_failures() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/anchors/1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server).anchor(1, digest()).await.unwrap_err();
        assert!(matches!(err, AuditError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn test_anchor_rejection_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/anchors/1"))
            .respond_with(ResponseTemplate::new(422).set_body_string("malformed digest"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).anchor(1, digest()).await.unwrap_err();
        assert!(matches!(err, AuditError::LedgerRejected(_)));
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure(StatusCode::BAD_GATEWAY, String::new()).is_transient());
        assert!(classify_failure(StatusCode::TOO_MANY_REQUESTS, String::new()).is_transient());
        assert!(!classify_failure(StatusCode::BAD_REQUEST, String::new()).is_transient());
    }
}
