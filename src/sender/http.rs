use super::retry::RetryConfig;
use super::{MessageSink, SinkError};
use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, ClientBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub max_connections: usize,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080/ingest".to_string(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            max_connections: 4,
            user_agent: format!("ua-batch-publisher/{}", crate::VERSION),
            retry: RetryConfig::default(),
        }
    }
}

/// POSTs each batch as `application/json` to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: Url,
    retry: RetryConfig,
}

impl HttpSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let endpoint: Url = config.endpoint.parse().map_err(|e| {
            SinkError::InvalidConfiguration(format!("Invalid endpoint URL: {e}"))
        })?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                SinkError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            retry: config.retry,
        })
    }

    async fn post_once(&self, payload: Bytes) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SinkError::HttpError {
                status: status.as_u16(),
            })
        }
    }
}

impl MessageSink for HttpSink {
    async fn send(&self, payload: Bytes) -> Result<(), SinkError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let start = Instant::now();
            // Bytes clones share the buffer
            match self.post_once(payload.clone()).await {
                Ok(()) => {
                    debug!(
                        bytes = payload.len(),
                        attempt,
                        latency = ?start.elapsed(),
                        "Batch delivered"
                    );
                    return Ok(());
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt >= max_attempts => {
                    return Err(SinkError::RetriesExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.retry.calculate_delay(attempt);
                    warn!(
                        "Send attempt {} of {} failed: {}. Retrying in {:?}",
                        attempt, max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
