//! HTTP transport to the usage statistics collector

use std::time::Duration;

use async_trait::async_trait;
use error_handling::RetryableError;
use reqwest::StatusCode;
use serde_json::Value;

use crate::error::UsageStatisticsError;

/// Why a record did not reach the collector
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// 4xx: the record is malformed and will never be accepted
    #[error("Collector rejected record with status {0}")]
    Rejected(StatusCode),

    /// 5xx
    #[error("Collector failed with status {0}")]
    Server(StatusCode),

    /// Unreachable, DNS failure, timeout
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RetryableError for DeliveryError {
    fn is_transient(&self) -> bool {
        !matches!(self, DeliveryError::Rejected(_))
    }
}

impl DeliveryError {
    /// Classifies a non-success status
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_client_error() {
            DeliveryError::Rejected(status)
        } else {
            DeliveryError::Server(status)
        }
    }
}

/// Something that can hand a serialized record to the collector
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: &Value) -> Result<StatusCode, DeliveryError>;
}

/// POSTs JSON bodies to the collector URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        url: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, UsageStatisticsError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| UsageStatisticsError::HttpClient(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &Value) -> Result<StatusCode, DeliveryError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Transport(format!("timed out: {}", e))
                } else if e.is_connect() {
                    DeliveryError::Transport(format!("unable to connect: {}", e))
                } else {
                    DeliveryError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(status)
        } else {
            Err(DeliveryError::from_status(status))
        }
    }
}
