//! HTTP client for the collection endpoint
//!
//! One call to [`DeliveryClient::submit`] is one `POST` of one event. The
//! client classifies what happened and never retries.

use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::config::DeliveryConfig;
use crate::error::{Error, Result};

use super::codec::WireRecord;

/// Result of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint answered with a status in the success range
    Delivered,
    /// The endpoint answered with any other status
    Rejected(u16),
    /// No usable response: connect error, timeout, reset, bad request body
    TransportFailure(String),
}

/// Sends one encoded event to the remote endpoint
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Submit `record` and report how it went.
    ///
    /// Implementations must bound the call with a timeout and must not retry.
    async fn submit(&self, record: &WireRecord) -> Outcome;
}

/// [`DeliveryClient`] backed by `reqwest`
pub struct HttpDeliveryClient {
    http_client: reqwest::Client,
    base_url: String,
    endpoint_url: String,
    success: RangeInclusive<u16>,
}

impl HttpDeliveryClient {
    /// Create a new delivery client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .as_deref()
            .ok_or_else(|| Error::Config("delivery.server_url is required".to_string()))?
            .trim()
            .trim_end_matches('/')
            .to_string();
        let endpoint_url = format!("{}{}", base_url, config.endpoint_path);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("notirelay/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Delivery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
            endpoint_url,
            success: config.success_range(),
        })
    }

    /// Full URL events are posted to
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Check if the client can reach the server
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn classify(&self, status: u16) -> Outcome {
        if self.success.contains(&status) {
            Outcome::Delivered
        } else {
            Outcome::Rejected(status)
        }
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn submit(&self, record: &WireRecord) -> Outcome {
        tracing::debug!(
            url = %self.endpoint_url,
            source_id = %record.package_name,
            timestamp = %record.timestamp,
            "Sending event"
        );

        let response = match self
            .http_client
            .post(&self.endpoint_url)
            .json(record)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Outcome::TransportFailure(describe_transport_error(&e)),
        };

        // Body is not part of the contract
        self.classify(response.status().as_u16())
    }
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_builder() || error.is_request() {
        "request failed"
    } else {
        "transport error"
    };
    format!("{}: {}", kind, error)
}
