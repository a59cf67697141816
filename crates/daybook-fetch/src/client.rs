//! HTTP client for the daily history API.

use async_trait::async_trait;
use chrono::NaiveDate;
use daybook_types::DailyQuote;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Header carrying the API key on the free tier.
const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// Configuration for the history client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote API.
    pub base_url: String,
    /// API key sent with every request, if any.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            api_key: std::env::var("COINGECKO_API_KEY").ok(),
            timeout: Duration::from_secs(30),
            user_agent: format!("daybook/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// A classified fetch failure.
///
/// The engine's retry discipline depends only on this tagging, not on the
/// transport details behind it.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// The remote quota was exceeded; retrying after a delay may succeed.
    #[error("Rate limited by remote API")]
    RateLimited {
        /// Server-suggested wait before the next attempt, when provided.
        retry_after: Option<Duration>,
    },

    /// A failure expected to succeed on retry (timeout, 5xx, connection).
    #[error("Transient error: {0}")]
    Transient(String),

    /// A failure retrying cannot fix (unknown asset, bad request).
    #[error("Permanent error: {0}")]
    Permanent(String),

    /// The response body was not the expected document shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Returns true if a retry may resolve this failure.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// The seam through which the engine fetches one (asset, date) record.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches the daily record for an asset on a calendar date.
    ///
    /// # Errors
    ///
    /// Returns a classified [`ClientError`]; no retries happen here.
    async fn fetch_daily(&self, asset_id: &str, date: NaiveDate) -> Result<DailyQuote, ClientError>;
}

/// HTTP client for the CoinGecko coin history endpoint.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    config: ClientConfig,
}

impl CoinGeckoClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            // Keep connections alive for reuse across a bulk run
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, reqwest::Error> {
        Self::new(ClientConfig::default())
    }

    /// Returns the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Classifies a transport-level send failure.
    fn classify_send_error(error: &reqwest::Error) -> ClientError {
        // Builder errors are configuration problems, not network weather
        if error.is_builder() {
            return ClientError::Permanent(error.to_string());
        }
        if error.is_timeout() || error.is_connect() || error.is_request() {
            return ClientError::Transient(error.to_string());
        }
        ClientError::Permanent(error.to_string())
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_daily(&self, asset_id: &str, date: NaiveDate) -> Result<DailyQuote, ClientError> {
        let url = format!("{}/coins/{}/history", self.config.base_url, asset_id);
        // The history endpoint expects dd-mm-yyyy
        let date_param = date.format("%d-%m-%Y").to_string();

        debug!(asset = asset_id, date = %date, "requesting daily history");

        let mut request = self.client.get(&url).query(&[("date", date_param)]);
        if let Some(key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ClientError::RateLimited { retry_after });
        }
        if status.is_server_error() {
            return Err(ClientError::Transient(format!("server error: {status}")));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Permanent(format!("{status}: {body}")));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(DailyQuote::from_payload(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn client_for(server: &MockServer) -> CoinGeckoClient {
        let config = ClientConfig {
            base_url: server.uri(),
            api_key: Some("test-key".to_string()),
            ..Default::default()
        };
        CoinGeckoClient::new(config).unwrap()
    }

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig {
            api_key: None,
            ..Default::default()
        };
        assert_eq!(config.base_url, "https://api.coingecko.com/api/v3");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.user_agent.starts_with("daybook/"));
    }

    #[tokio::test]
    async fn test_fetch_daily_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/coins/bitcoin/history"))
            .and(query_param("date", "15-01-2024"))
            .and(header(API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "bitcoin",
                "market_data": { "current_price": { "usd": 42123.45 } }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let quote = client.fetch_daily("bitcoin", test_date()).await.unwrap();

        assert_eq!(quote.price, Some(42123.45));
        assert_eq!(quote.payload["id"], "bitcoin");
    }

    #[tokio::test]
    async fn test_fetch_daily_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_daily("bitcoin", test_date()).await.unwrap_err();

        match err {
            ClientError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_daily_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.fetch_daily("bitcoin", test_date()).await.unwrap_err();

        assert!(matches!(err, ClientError::Transient(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_daily_not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "coin not found"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .fetch_daily("not-a-coin", test_date())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Permanent(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_daily_missing_price_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "bitcoin",
                "name": "Bitcoin"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let quote = client.fetch_daily("bitcoin", test_date()).await.unwrap();

        assert_eq!(quote.price, None);
    }
}
