mod common;

use common::parse;
use ua_batch_publisher::BatchFrame;
use ua_batch_publisher::buffer::CLOSING_BYTES;

#[test]
fn test_finalized_frame_parses_back_to_payloads() {
    let payloads = [
        r#"{"DataSetWriterId":"urn:a:1000","Payload":{"i=1":{"Value":1}}}"#,
        r#"{"DataSetWriterId":"urn:a:1000","Payload":{"i=2":{"Value":"text, with comma"}}}"#,
        r#"[1,2,3]"#,
        r#""plain string""#,
    ];

    let mut frame = BatchFrame::new("edge-7");
    for payload in payloads {
        frame.append(payload);
    }
    let batch = frame.finalize().unwrap();

    let json = parse(&batch);
    assert_eq!(json["MessageId"], "0");
    assert_eq!(json["MessageType"], "ua-data");
    assert_eq!(json["PublisherId"], "edge-7");

    let expected: Vec<serde_json::Value> = payloads
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(json["Messages"].as_array().unwrap(), &expected);
}

#[test]
fn test_single_payload_has_no_trailing_separator() {
    let mut frame = BatchFrame::new("p");
    frame.append("42");
    let batch = frame.finalize().unwrap();

    assert!(batch.ends_with(b"[42]}"));
}

#[test]
fn test_finalized_length_matches_closing_overhead() {
    let mut frame = BatchFrame::new("p");
    frame.append("\"a\"");
    frame.append("\"b\"");
    let open_len = frame.len();

    let batch = frame.finalize().unwrap();
    // trailing separator replaced by the footer
    assert_eq!(batch.len(), open_len - 1 + CLOSING_BYTES);
}

#[test]
fn test_reset_of_empty_frame_only_changes_message_id() {
    let mut frame = BatchFrame::new("p");
    frame.reset();
    let first = String::from_utf8(frame.as_bytes().to_vec()).unwrap();
    frame.reset();
    let second = String::from_utf8(frame.as_bytes().to_vec()).unwrap();

    assert_eq!(
        first.replacen("\"MessageId\":\"1\"", "", 1),
        second.replacen("\"MessageId\":\"2\"", "", 1)
    );
    assert_ne!(first, second);
    assert!(frame.is_empty());
}

#[test]
fn test_message_ids_increase_per_batch() {
    let mut frame = BatchFrame::new("p");
    for expected in 0..5 {
        frame.append("1");
        let batch = frame.finalize().unwrap();
        assert_eq!(parse(&batch)["MessageId"], expected.to_string());
        frame.reset();
    }
}
