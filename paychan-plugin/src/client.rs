//! Outbound client for a peer's inbound service.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, instrument};

use paychan_core::constants::{DATA_PATH, OCTET_STREAM};
use paychan_core::error::{PaychanError, Result};
use paychan_core::types::Account;

/// Identity response body. `account` stays loose so that a missing or
/// unparseable value is reported as a malformed response rather than a
/// generic JSON error.
#[derive(Deserialize)]
struct IdentityBody {
    account: Option<serde_json::Value>,
}

/// HTTP client bound to one peer base URL.
#[derive(Clone, Debug)]
pub struct PeerClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl PeerClient {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaychanError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// Peer base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Asks the peer's identity endpoint for its account.
    #[instrument(skip(self), fields(peer = %self.base_url))]
    pub async fn discover(&self) -> Result<Account> {
        let response = self
            .http_client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| PaychanError::PeerUnreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaychanError::PeerUnreachable(format!(
                "{} responded {}",
                self.base_url,
                response.status()
            )));
        }

        let body: IdentityBody = response
            .json()
            .await
            .map_err(|e| PaychanError::MalformedPeerResponse(e.to_string()))?;

        let raw = body
            .account
            .ok_or_else(|| PaychanError::MalformedPeerResponse("missing 'account' field".into()))?;
        let account: Account = serde_json::from_value(raw.clone()).map_err(|e| {
            PaychanError::MalformedPeerResponse(format!("invalid account {}: {}", raw, e))
        })?;

        debug!(account = ?account, "Discovered peer account");
        Ok(account)
    }

    /// Posts `data` to the peer's data endpoint and returns the response body.
    #[instrument(skip(self, data), fields(peer = %self.base_url, len = data.len()))]
    pub async fn send_data(&self, data: Bytes) -> Result<Bytes> {
        debug!(data = %hex::encode(&data), "Sending data");

        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, DATA_PATH))
            .header(CONTENT_TYPE, OCTET_STREAM)
            .body(data)
            .send()
            .await
            .map_err(|e| PaychanError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PaychanError::Transport(format!(
                "data endpoint responded {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| PaychanError::Transport(e.to_string()))?;

        debug!(response = %hex::encode(&body), "Got response");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PeerClient {
        PeerClient::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_discover_account() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "account": "0x2222222222222222222222222222222222222222"
            })))
            .mount(&server)
            .await;

        let account = client(&server).discover().await.unwrap();
        assert_eq!(account, Account::repeat_byte(0x22));
    }

    #[tokio::test]
    async fn test_discover_non_success_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = client(&server).discover().await;
        assert!(matches!(result, Err(PaychanError::PeerUnreachable(_))));
    }

    #[tokio::test]
    async fn test_discover_connection_refused_is_unreachable() {
        let client = PeerClient::new("http://127.0.0.1:1", Duration::from_secs(5)).unwrap();
        assert!(matches!(client.discover().await, Err(PaychanError::PeerUnreachable(_))));
    }

    #[tokio::test]
    async fn test_discover_missing_account_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "peer": "x" })))
            .mount(&server)
            .await;

        let result = client(&server).discover().await;
        assert!(matches!(result, Err(PaychanError::MalformedPeerResponse(_))));
    }

    #[tokio::test]
    async fn test_discover_garbage_account_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "account": 42 })))
            .mount(&server)
            .await;

        let result = client(&server).discover().await;
        assert!(matches!(result, Err(PaychanError::MalformedPeerResponse(_))));
    }

    #[tokio::test]
    async fn test_send_data_posts_octet_stream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/data"))
            .and(header("content-type", OCTET_STREAM))
            .and(body_bytes(vec![0u8; 4]))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xffu8; 4]))
            .expect(1)
            .mount(&server)
            .await;

        let body = client(&server).send_data(Bytes::from(vec![0u8; 4])).await.unwrap();
        assert_eq!(&body[..], &[0xff; 4]);
    }

    #[tokio::test]
    async fn test_send_data_non_success_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client(&server).send_data(Bytes::from_static(b"x")).await;
        assert!(matches!(result, Err(PaychanError::Transport(_))));
    }
}
