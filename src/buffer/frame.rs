use bytes::Bytes;

/// Value of the `MessageType` header field of every batch.
pub const MESSAGE_TYPE: &str = "ua-data";

/// Bytes written by `finalize` after the last payload (`]}`).
pub const CLOSING_BYTES: usize = 2;

const SEPARATOR: u8 = b',';

/// One in-progress framed batch.
///
/// The wire layout is a single JSON object:
///
/// ```text
/// {"MessageId":"<n>","MessageType":"ua-data","PublisherId":"<id>","Messages":[p1,p2,...]}
/// ```
///
/// Payloads are copied in verbatim; the frame never parses them. Every append
/// writes a trailing separator which `finalize` strips again.
#[derive(Debug)]
pub struct BatchFrame {
    buf: Vec<u8>,
    publisher_id: String,
    message_id: u64,
    next_message_id: u64,
    notifications: usize,
}

impl BatchFrame {
    /// Open the first frame (message id 0) for `publisher_id`.
    pub fn new(publisher_id: impl Into<String>) -> Self {
        let mut frame = Self {
            buf: Vec::new(),
            // Serialized once; a JSON string value with its quotes.
            publisher_id: serde_json::Value::String(publisher_id.into()).to_string(),
            message_id: 0,
            next_message_id: 0,
            notifications: 0,
        };
        frame.reset();
        frame
    }

    /// Discard everything and open a fresh frame with the next message id.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.notifications = 0;
        self.message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.wrapping_add(1);

        write_header(&mut self.buf, self.message_id, &self.publisher_id);
    }

    /// Worst-case framing bytes of a batch for `publisher_id`: the header
    /// with the widest message id plus the closing bytes.
    ///
    /// An oversized first payload is still appended to an empty frame, so
    /// this must fit inside the reserved overhead to keep every batch within
    /// its ceiling.
    pub fn framing_overhead(publisher_id: &str) -> usize {
        let mut buf = Vec::new();
        let publisher_id = serde_json::Value::String(publisher_id.to_string()).to_string();
        write_header(&mut buf, u64::MAX, &publisher_id);
        buf.len() + CLOSING_BYTES
    }

    pub fn append(&mut self, payload: &str) {
        self.buf.extend_from_slice(payload.as_bytes());
        self.buf.push(SEPARATOR);
        self.notifications += 1;
    }

    /// Close the frame and hand out the finished batch.
    ///
    /// Returns `None` for a frame without notifications. The frame is left
    /// empty and must be `reset` before the next append.
    pub fn finalize(&mut self) -> Option<Bytes> {
        if self.notifications == 0 {
            return None;
        }

        // drop the separator written by the last append
        self.buf.pop();
        self.buf.extend_from_slice(b"]}");
        self.notifications = 0;

        Some(Bytes::from(std::mem::take(&mut self.buf)))
    }

    /// Current length in bytes, header and separators included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True while no notification has been appended since the last reset.
    pub fn is_empty(&self) -> bool {
        self.notifications == 0
    }

    pub fn notification_count(&self) -> usize {
        self.notifications
    }

    pub fn message_id(&self) -> u64 {
        self.message_id
    }

    /// The raw bytes written so far (open frame, not yet valid JSON).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

/// `publisher_id` is the already serialized JSON string.
fn write_header(buf: &mut Vec<u8>, message_id: u64, publisher_id: &str) {
    buf.extend_from_slice(b"{\"MessageId\":\"");
    buf.extend_from_slice(message_id.to_string().as_bytes());
    buf.extend_from_slice(b"\",\"MessageType\":\"");
    buf.extend_from_slice(MESSAGE_TYPE.as_bytes());
    buf.extend_from_slice(b"\",\"PublisherId\":");
    buf.extend_from_slice(publisher_id.as_bytes());
    buf.extend_from_slice(b",\"Messages\":[");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = BatchFrame::new("line-3");
        assert_eq!(
            frame.as_bytes(),
            br#"{"MessageId":"0","MessageType":"ua-data","PublisherId":"line-3","Messages":["#
        );
        assert!(frame.is_empty());
        assert_eq!(frame.message_id(), 0);
    }

    #[test]
    fn test_publisher_id_is_json_escaped() {
        let frame = BatchFrame::new("plant \"A\"");
        let header = String::from_utf8(frame.as_bytes().to_vec()).unwrap();
        assert!(header.contains(r#""PublisherId":"plant \"A\"""#));
    }

    #[test]
    fn test_finalize_strips_trailing_separator() {
        let mut frame = BatchFrame::new("p");
        frame.append(r#"{"a":1}"#);
        frame.append(r#"{"b":2}"#);
        assert_eq!(frame.notification_count(), 2);

        let bytes = frame.finalize().unwrap();
        assert_eq!(
            &bytes[..],
            br#"{"MessageId":"0","MessageType":"ua-data","PublisherId":"p","Messages":[{"a":1},{"b":2}]}"#
        );
        assert!(frame.is_empty());
    }

    #[test]
    fn test_finalize_empty_frame_returns_none() {
        let mut frame = BatchFrame::new("p");
        let header_len = frame.len();

        assert!(frame.finalize().is_none());
        // header untouched
        assert_eq!(frame.len(), header_len);
    }

    #[test]
    fn test_len_counts_separators() {
        let mut frame = BatchFrame::new("p");
        let header_len = frame.len();
        frame.append("12345");
        assert_eq!(frame.len(), header_len + 6);
    }

    #[test]
    fn test_reset_increments_message_id() {
        let mut frame = BatchFrame::new("p");
        frame.append("1");
        frame.finalize();
        frame.reset();
        assert_eq!(frame.message_id(), 1);

        frame.reset();
        assert_eq!(frame.message_id(), 2);
        assert!(frame.as_bytes().starts_with(br#"{"MessageId":"2","#));
    }

    #[test]
    fn test_framing_overhead_covers_widest_message_id() {
        let frame = BatchFrame::new("line-3");
        let widest_id_extra = u64::MAX.to_string().len() - 1;

        assert_eq!(
            BatchFrame::framing_overhead("line-3"),
            frame.len() + widest_id_extra + CLOSING_BYTES
        );
        // escaping counts
        assert_eq!(
            BatchFrame::framing_overhead("a\"b"),
            BatchFrame::framing_overhead("a_b") + 1
        );
    }
}
