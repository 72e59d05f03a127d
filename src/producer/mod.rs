//! Event Producer
//!
//! Delivers canonical asset events to the downstream queue. The HTTP
//! producer posts one JSON document per event; the stdout producer writes
//! JSON lines and backs the CLI dry-run mode.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::retry::{retry_async, RetryPolicy};
use crate::domain::AssetEvent;

#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    #[error("invalid producer endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("producer returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProducerError {
    fn is_transient(&self) -> bool {
        match self {
            ProducerError::Status { status, .. } => *status == 429 || *status >= 500,
            ProducerError::Http(e) => !e.is_builder(),
            _ => false,
        }
    }
}

/// Sink for validated asset events
#[async_trait]
pub trait AssetProducer: Send + Sync {
    async fn produce(&self, event: &AssetEvent) -> Result<(), ProducerError>;
}

/// Posts events to an HTTP queue producer endpoint
pub struct HttpProducer {
    endpoint: Url,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpProducer {
    pub fn new(endpoint: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, ProducerError> {
        let endpoint = parse_endpoint(endpoint)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            endpoint,
            client,
            retry,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post(&self, body: &[u8]) -> Result<(), ProducerError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProducerError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Endpoints must be absolute http(s) URLs
pub fn parse_endpoint(endpoint: &str) -> Result<Url, ProducerError> {
    let invalid = |message: String| ProducerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message,
    };
    let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

#[async_trait]
impl AssetProducer for HttpProducer {
    async fn produce(&self, event: &AssetEvent) -> Result<(), ProducerError> {
        let body = serde_json::to_vec(event)?;
        retry_async(
            "produce_asset_event",
            &self.retry,
            || self.post(&body),
            ProducerError::is_transient,
        )
        .await?;
        log::trace!("Delivered event for asset {} to {}", event.id, self.endpoint);
        Ok(())
    }
}

/// Writes each event as one JSON line
pub struct StdoutProducer<W: Write + Send> {
    out: Mutex<W>,
}

impl StdoutProducer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> StdoutProducer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl<W: Write + Send> AssetProducer for StdoutProducer<W> {
    async fn produce(&self, event: &AssetEvent) -> Result<(), ProducerError> {
        let line = serde_json::to_string(event)?;
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(out, "{}", line)?;
        Ok(())
    }
}
