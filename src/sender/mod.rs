pub mod channel;
pub mod http;
pub mod retry;

pub use channel::ChannelSink;
pub use http::{HttpSink, HttpSinkConfig};
pub use retry::RetryConfig;

use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
    #[error("Sink receiver has been dropped")]
    Closed,
}

impl SinkError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            SinkError::RequestError(e) => !e.is_builder(),
            SinkError::HttpError { status } => *status == 429 || *status >= 500,
            SinkError::InvalidConfiguration(_)
            | SinkError::RetriesExhausted { .. }
            | SinkError::Closed => false,
        }
    }
}

/// Destination for finished batches.
///
/// Implementations may retry internally; an `Err` means the batch is lost.
pub trait MessageSink: Send + Sync {
    fn send(&self, payload: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send;
}

impl<S: MessageSink> MessageSink for Arc<S> {
    fn send(&self, payload: Bytes) -> impl Future<Output = Result<(), SinkError>> + Send {
        (**self).send(payload)
    }
}
