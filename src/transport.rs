//! HTTP transport for the Hyperliquid API
//!
//! Two endpoints carry all traffic: `POST /info` for unauthenticated reads
//! and `POST /exchange` for signed actions. Requests share one token bucket
//! with the WebSocket subscribe path and carry a per-request timeout; a
//! timed-out action may still have executed, so callers reconcile rather
//! than blindly resubmit.

use crate::actions::{ExchangeRequest, ExchangeResponse, InfoRequest};
use crate::config::HttpConfig;
use crate::errors::{HyperfillError, Result};
use crate::utils::rate_limit::TokenBucket;
use crate::utils::time::NonceGenerator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Blocking-free HTTP client for the venue's two POST endpoints
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    rate_limiter: Arc<TokenBucket>,
    nonces: NonceGenerator,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        // Skip OS proxy discovery; it can block in sandboxed environments
        let client = reqwest::ClientBuilder::new()
            .no_proxy()
            .tcp_nodelay(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| HyperfillError::config(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(config.timeout_ms),
            rate_limiter: Arc::new(TokenBucket::per_second(config.rate_limit_rps)),
            nonces: NonceGenerator::new(),
        })
    }

    /// The token bucket shared with WebSocket subscribe frames
    pub fn rate_limiter(&self) -> Arc<TokenBucket> {
        self.rate_limiter.clone()
    }

    /// Next strictly-increasing action nonce
    pub fn next_nonce(&self) -> u64 {
        self.nonces.next()
    }

    /// Unauthenticated read query against `POST /info`
    pub async fn post_info<T: DeserializeOwned>(&self, request: &InfoRequest) -> Result<T> {
        debug!(request_type = %request.request_type, "info request");
        self.post_json("/info", request).await
    }

    /// Signed action submission against `POST /exchange`
    pub async fn post_exchange(&self, request: &ExchangeRequest) -> Result<ExchangeResponse> {
        debug!(nonce = request.nonce, "exchange request");
        self.post_json("/exchange", request).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        if !self.rate_limiter.try_consume() {
            return Err(HyperfillError::rate_limited(format!(
                "local token bucket exhausted for {path}"
            )));
        }

        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() == 429 {
            warn!(%url, "venue rate limit hit");
            return Err(HyperfillError::rate_limited(format!(
                "venue returned 429: {text}"
            )));
        }
        if status.is_server_error() {
            return Err(HyperfillError::connection_failed(format!(
                "server error {status}: {text}"
            )));
        }
        if !status.is_success() {
            return Err(HyperfillError::invalid_response(format!(
                "client error {status}: {text}"
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            HyperfillError::invalid_response(format!("failed to parse {path} response: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Meta;

    fn transport(base_url: &str) -> HttpTransport {
        HttpTransport::new(base_url, &HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_post_info_parses_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/info")
            .match_body(mockito::Matcher::Json(serde_json::json!({"type": "meta"})))
            .with_status(200)
            .with_body(r#"{"universe": [{"name": "BTC", "szDecimals": 5}]}"#)
            .create_async()
            .await;

        let meta: Meta = transport(&server.url())
            .post_info(&InfoRequest::meta())
            .await
            .unwrap();
        assert_eq!(meta.universe[0].name, "BTC");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_venue_429_maps_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(429)
            .with_body("Too many requests")
            .create_async()
            .await;

        let err = transport(&server.url())
            .post_info::<Meta>(&InfoRequest::meta())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HyperfillError::Protocol {
                kind: crate::errors::ProtocolErrorKind::RateLimited,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/info")
            .with_status(503)
            .create_async()
            .await;

        let err = transport(&server.url())
            .post_info::<Meta>(&InfoRequest::meta())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_local_bucket_exhaustion_errors_without_sending() {
        let config = HttpConfig {
            rate_limit_rps: 1,
            ..Default::default()
        };
        // Unroutable base URL: if the bucket check fails open, the request
        // itself would error differently
        let transport = HttpTransport::new("http://127.0.0.1:1", &config).unwrap();
        assert!(transport.rate_limiter.try_consume());
        let err = transport
            .post_info::<Meta>(&InfoRequest::meta())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HyperfillError::Protocol {
                kind: crate::errors::ProtocolErrorKind::RateLimited,
                ..
            }
        ));
    }

    #[test]
    fn test_nonces_increase() {
        let transport = transport("http://localhost");
        let a = transport.next_nonce();
        let b = transport.next_nonce();
        assert!(b > a);
    }
}
