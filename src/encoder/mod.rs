pub mod json;

pub use json::JsonMessageEncoder;

use crate::domain::NotificationRecord;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Record has no expanded node id")]
    MissingNodeId,
    #[error("Encoder failed: {0}")]
    Other(String),
}

/// Turns one record into the textual payload placed in a batch.
///
/// Implementations must be stateless; the engine calls `encode` exactly once
/// per accepted record and treats the result as opaque.
#[cfg_attr(test, automock)]
pub trait MessageEncoder: Send + Sync {
    fn encode(&self, record: &NotificationRecord) -> Result<String, EncodingError>;
}
