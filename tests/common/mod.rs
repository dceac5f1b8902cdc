#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Arc;
use ua_batch_publisher::domain::{DataChange, NotificationHeader, NotificationRecord};
use ua_batch_publisher::encoder::{EncodingError, MessageEncoder};
use ua_batch_publisher::sender::{MessageSink, SinkError};
use ua_batch_publisher::{Diagnostics, IntakeQueue};

pub fn record(node: &str) -> NotificationRecord {
    NotificationRecord::data_change(
        NotificationHeader::new("opc.tcp://plc:4840", "urn:plc", node, node, 1000.0),
        DataChange::new(serde_json::json!(1)),
    )
}

pub fn queue(capacity: usize) -> (Arc<IntakeQueue>, Arc<Diagnostics>) {
    let diag = Arc::new(Diagnostics::new());
    let queue = Arc::new(IntakeQueue::new(capacity, diag.clone()).unwrap());
    (queue, diag)
}

/// Encodes a record as a JSON string of the node id.
///
/// A node id of the form `<name>:<n>` is padded so the payload is exactly
/// `n` bytes long, quotes included.
pub struct SizedEncoder;

impl MessageEncoder for SizedEncoder {
    fn encode(&self, record: &NotificationRecord) -> Result<String, EncodingError> {
        let node = &record.header().expanded_node_id;
        match node.split_once(':') {
            Some((name, size)) => {
                let size: usize = size
                    .parse()
                    .map_err(|_| EncodingError::Other(format!("bad size in {node}")))?;
                let padding = size.saturating_sub(name.len() + 2);
                Ok(format!("\"{name}{}\"", "_".repeat(padding)))
            }
            None => Ok(format!("\"{node}\"")),
        }
    }
}

/// Fails every send.
pub struct FailingSink;

impl MessageSink for FailingSink {
    async fn send(&self, _payload: Bytes) -> Result<(), SinkError> {
        Err(SinkError::HttpError { status: 503 })
    }
}

pub fn parse(batch: &Bytes) -> serde_json::Value {
    serde_json::from_slice(batch).unwrap()
}

pub fn messages(batch: &Bytes) -> Vec<serde_json::Value> {
    parse(batch)["Messages"].as_array().unwrap().clone()
}

/// Node names of a batch encoded by `SizedEncoder`.
pub fn names(batch: &Bytes) -> Vec<String> {
    messages(batch)
        .iter()
        .map(|m| m.as_str().unwrap().trim_end_matches('_').to_string())
        .collect()
}
