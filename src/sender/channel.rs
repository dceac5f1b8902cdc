use super::{MessageSink, SinkError};
use bytes::Bytes;
use tokio::sync::mpsc;

/// Hands batches to an in-process receiver.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    async fn send(&self, payload: Bytes) -> Result<(), SinkError> {
        self.tx.send(payload).map_err(|_| SinkError::Closed)
    }
}
