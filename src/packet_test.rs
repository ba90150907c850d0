use super::*;
use serde_json::json;

fn sample_packet() -> Packet {
    Packet {
        kind: "offer".to_owned(),
        data: r#"{"sdp":"v=0"}"#.to_owned(),
        correlation_id: "corr-1".to_owned(),
        session_id: "session-1".to_owned(),
    }
}

#[test]
fn encode_decode_round_trip_preserves_packet() {
    let packet = sample_packet();
    let text = encode_packet(&packet).expect("encode");
    let decoded = decode_packet(text.as_bytes()).expect("decode");
    assert_eq!(decoded, packet);
}

#[test]
fn encoded_packet_uses_wire_field_names() {
    let text = encode_packet(&sample_packet()).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(
        value,
        json!({
            "type": "offer",
            "data": "{\"sdp\":\"v=0\"}",
            "packet_id": "corr-1",
            "session_id": "session-1"
        })
    );
}

#[test]
fn decode_fills_missing_fields_with_empty_strings() {
    let packet = decode_packet(br#"{"type":"heartbeat"}"#).expect("decode");
    assert_eq!(packet, Packet::heartbeat());
    assert!(packet.correlation_id.is_empty());
}

#[test]
fn decode_rejects_empty_frame() {
    let err = decode_packet(b"").expect_err("empty frame should fail");
    assert!(matches!(err, CodecError::Empty));
}

#[test]
fn decode_rejects_malformed_frame() {
    let err = decode_packet(b"{not json").expect_err("malformed frame should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn decode_rejects_non_string_field() {
    let err = decode_packet(br#"{"type":5}"#).expect_err("numeric type should fail");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn json_payload_helpers_nest_documents() {
    let packet = Packet::new("answer", "")
        .with_json(&json!({"sdp": "v=0", "candidates": 2}))
        .expect("encode payload");
    let payload: serde_json::Value = packet.json().expect("decode payload");
    assert_eq!(payload["candidates"], 2);
}

#[test]
fn json_payload_rejects_opaque_data() {
    let packet = Packet::new("answer", "plain text");
    let err = packet.json::<serde_json::Value>().expect_err("plain text is not json");
    assert!(matches!(err, CodecError::Decode(_)));
}

#[test]
fn stamp_overwrites_context() {
    let mut reply = Packet::new("ack", "").with_session_id("other");
    reply.correlation_id = "stale".to_owned();
    reply.stamp("corr-9", "session-9");
    assert_eq!(reply.correlation_id, "corr-9");
    assert_eq!(reply.session_id, "session-9");
}

#[test]
fn notice_encodes_two_fields_only() {
    let text = encode_notice(&Notice::new("input", "key:a")).expect("encode");
    let value: serde_json::Value = serde_json::from_str(&text).expect("json");
    assert_eq!(value, json!({"type": "input", "data": "key:a"}));
}
