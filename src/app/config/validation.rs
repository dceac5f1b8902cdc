use super::{Config, ConfigError};
use crate::buffer::BatchFrame;
use crate::engine::DEFAULT_MAX_BATCH_BYTES;
use url::Url;

// Prevent excessive memory allocation
const MAX_QUEUE_CAPACITY: usize = 100_000_000;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.sink_endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid sink endpoint URL '{}': {}",
                self.sink_endpoint, e
            ))
        })?;

        if self.queue_capacity == 0 || self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidConfig(format!(
                "Queue capacity must be between 1 and {MAX_QUEUE_CAPACITY}, got {}",
                self.queue_capacity
            )));
        }

        if !self.is_single_message() {
            let ceiling = if self.max_batch_bytes == 0 {
                DEFAULT_MAX_BATCH_BYTES
            } else {
                self.max_batch_bytes
            };
            if ceiling <= self.reserved_overhead_bytes {
                return Err(ConfigError::InvalidConfig(format!(
                    "Max batch bytes ({ceiling}) must be larger than the reserved overhead ({})",
                    self.reserved_overhead_bytes
                )));
            }

            if let Some(id) = self.publisher_id.as_deref() {
                let framing = BatchFrame::framing_overhead(id);
                if framing > self.reserved_overhead_bytes {
                    return Err(ConfigError::InvalidConfig(format!(
                        "Batch framing for publisher id of {} bytes needs {framing} bytes, more than the reserved overhead ({})",
                        id.len(),
                        self.reserved_overhead_bytes
                    )));
                }
            }
        }

        if self
            .publisher_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(ConfigError::InvalidConfig(
                "Publisher id must not be empty".to_string(),
            ));
        }

        if self.connection_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "Connection timeout must be greater than 0".to_string(),
            ));
        }

        if self.send_retry_attempts == 0 {
            return Err(ConfigError::InvalidConfig(
                "Send retry attempts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
