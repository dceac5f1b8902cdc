use super::{EncodingError, MessageEncoder};
use crate::domain::{DataChange, EventField, NotificationHeader, NotificationRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// Encodes records as PubSub JSON data set messages.
///
/// Data changes become `{"DataSetWriterId":..,"Payload":{<node id>:{"Value":..}}}`,
/// events carry their fields in `Payload` in the order they were reported.
#[derive(Debug, Clone, Default)]
pub struct JsonMessageEncoder {
    include_metadata: bool,
}

impl JsonMessageEncoder {
    pub fn new() -> Self {
        Self {
            include_metadata: true,
        }
    }

    /// Leave out `DisplayName`, `ApplicationUri` and `EndpointUrl`.
    pub fn without_metadata() -> Self {
        Self {
            include_metadata: false,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DataSetMessage<'a, P: Serialize> {
    data_set_writer_id: &'a str,
    payload: P,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    application_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    endpoint_url: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EncodedValue<'a> {
    value: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status_code: Option<u32>,
}

/// Single-entry map keyed by the node id.
struct NodePayload<'a> {
    node_id: &'a str,
    value: EncodedValue<'a>,
}

impl Serialize for NodePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.node_id, &self.value)?;
        map.end()
    }
}

/// Event fields as a map, keeping the reported order.
struct OrderedFields<'a>(&'a [EventField]);

impl Serialize for OrderedFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in self.0 {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

fn timestamp(ts: Option<&DateTime<Utc>>) -> Option<String> {
    ts.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

impl JsonMessageEncoder {
    fn message<'a, P: Serialize>(
        &self,
        header: &'a NotificationHeader,
        payload: P,
    ) -> DataSetMessage<'a, P> {
        let meta = |s: &'a String| self.include_metadata.then_some(s.as_str());
        DataSetMessage {
            data_set_writer_id: &header.group_id,
            payload,
            display_name: meta(&header.display_name),
            application_uri: meta(&header.application_uri),
            endpoint_url: meta(&header.source_endpoint),
        }
    }

    fn encode_data_change(
        &self,
        header: &NotificationHeader,
        change: &DataChange,
    ) -> Result<String, EncodingError> {
        let reversible = header.encoding_context.reversible;
        let payload = NodePayload {
            node_id: &header.expanded_node_id,
            value: EncodedValue {
                value: &change.value,
                source_timestamp: timestamp(change.source_timestamp.as_ref()),
                server_timestamp: timestamp(change.server_timestamp.as_ref()),
                // good status codes are implied unless the encoding is reversible
                status_code: (reversible || change.status_code != 0)
                    .then_some(change.status_code),
            },
        };

        Ok(serde_json::to_string(&self.message(header, payload))?)
    }

    fn encode_event(
        &self,
        header: &NotificationHeader,
        fields: &[EventField],
    ) -> Result<String, EncodingError> {
        Ok(serde_json::to_string(
            &self.message(header, OrderedFields(fields)),
        )?)
    }
}

impl MessageEncoder for JsonMessageEncoder {
    fn encode(&self, record: &NotificationRecord) -> Result<String, EncodingError> {
        if record.header().expanded_node_id.is_empty() {
            return Err(EncodingError::MissingNodeId);
        }

        match record {
            NotificationRecord::DataChange { header, change } => {
                self.encode_data_change(header, change)
            }
            NotificationRecord::Event { header, fields } => self.encode_event(header, fields),
        }
    }
}
