use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity bits of an OPC UA status code; `0b10` marks a bad value.
const STATUS_SEVERITY_MASK: u32 = 0xC000_0000;
const STATUS_SEVERITY_BAD: u32 = 0x8000_0000;

/// Opaque context the encoder needs to render values of a session.
///
/// The pipeline never looks inside; it is carried along with the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingContext {
    #[serde(default)]
    pub namespace_uris: Vec<String>,
    #[serde(default)]
    pub reversible: bool,
}

/// Identity fields shared by data change and event notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationHeader {
    pub source_endpoint: String,
    pub application_uri: String,
    pub display_name: String,
    pub expanded_node_id: String,
    /// Routing key: application URI plus subscription publishing interval.
    pub group_id: String,
    #[serde(default)]
    pub encoding_context: EncodingContext,
}

impl NotificationHeader {
    pub fn new(
        source_endpoint: impl Into<String>,
        application_uri: impl Into<String>,
        display_name: impl Into<String>,
        expanded_node_id: impl Into<String>,
        publishing_interval_ms: f64,
    ) -> Self {
        let application_uri = application_uri.into();
        let group_id = Self::group_id_for(&application_uri, publishing_interval_ms);

        Self {
            source_endpoint: source_endpoint.into(),
            application_uri,
            display_name: display_name.into(),
            expanded_node_id: expanded_node_id.into(),
            group_id,
            encoding_context: EncodingContext::default(),
        }
    }

    pub fn group_id_for(application_uri: &str, publishing_interval_ms: f64) -> String {
        format!("{application_uri}:{publishing_interval_ms}")
    }
}

/// A single value change with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChange {
    pub value: serde_json::Value,
    #[serde(default)]
    pub source_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_code: u32,
}

impl DataChange {
    pub fn new(value: serde_json::Value) -> Self {
        Self {
            value,
            source_timestamp: None,
            server_timestamp: None,
            status_code: 0,
        }
    }

    pub fn is_bad(&self) -> bool {
        self.status_code & STATUS_SEVERITY_MASK == STATUS_SEVERITY_BAD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventField {
    pub name: String,
    pub value: serde_json::Value,
}

/// One telemetry notification handed to the pipeline.
///
/// Records are immutable once enqueued; the engine only passes them to the
/// encoder and never inspects the variant itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationRecord {
    DataChange {
        header: NotificationHeader,
        change: DataChange,
    },
    Event {
        header: NotificationHeader,
        #[serde(default)]
        fields: Vec<EventField>,
    },
}

impl NotificationRecord {
    pub fn data_change(header: NotificationHeader, change: DataChange) -> Self {
        Self::DataChange { header, change }
    }

    pub fn event(header: NotificationHeader, fields: Vec<EventField>) -> Self {
        Self::Event { header, fields }
    }

    pub fn header(&self) -> &NotificationHeader {
        match self {
            Self::DataChange { header, .. } | Self::Event { header, .. } => header,
        }
    }

    /// True for data changes reported with a bad status code.
    pub fn has_bad_status(&self) -> bool {
        matches!(self, Self::DataChange { change, .. } if change.is_bad())
    }
}
