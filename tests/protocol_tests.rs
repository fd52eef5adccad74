//! Integration tests for protocol serialization and framing

use proptest::prelude::*;
use serde_json::json;
use termdeck::protocol::{
    deserialize, frame_message, serialize, serialize_and_frame, unframe_message, ClientMessage,
    ServerMessage, SessionStatus, MAX_MESSAGE_SIZE,
};

#[test]
fn client_message_roundtrip() {
    let messages = vec![
        ClientMessage::Ready,
        ClientMessage::SelectProject {
            tab_id: Some(1),
            terminal_id: None,
            project_path: "/work/demo".to_string(),
            resume: Some("session-token".to_string()),
        },
        ClientMessage::Input {
            tab_id: 1,
            terminal_id: 2,
            data: "ls -la\r".to_string(),
        },
        ClientMessage::Resize {
            tab_id: 1,
            terminal_id: 0,
            cols: 120,
            rows: 40,
        },
        ClientMessage::ResolveDrop {
            tab_id: 2,
            terminal_id: 3,
            payload: json!(["file:///tmp/a", "/tmp/b"]),
        },
        ClientMessage::OpenFile {
            file_path: "/src/main.rs".to_string(),
            line: Some(3),
            column: None,
            tab_id: None,
            terminal_id: None,
        },
        ClientMessage::CreateTab,
        ClientMessage::SwitchTab { tab_id: 2 },
        ClientMessage::CloseTab { tab_id: 2 },
    ];

    for msg in messages {
        let encoded = serialize(&msg).expect("serialize failed");
        let decoded: ClientMessage = deserialize(&encoded).expect("deserialize failed");

        // Compare debug representations since ClientMessage doesn't derive PartialEq
        assert_eq!(format!("{:?}", msg), format!("{:?}", decoded));
    }
}

#[test]
fn server_message_roundtrip() {
    let messages = vec![
        ServerMessage::Output {
            tab_id: 1,
            terminal_id: 0,
            data: "output data".to_string(),
            timestamp: 1234567890,
        },
        ServerMessage::Status {
            tab_id: 1,
            terminal_id: 3,
            status: SessionStatus::Busy,
        },
        ServerMessage::Killed {
            tab_id: 2,
            terminal_id: 1,
        },
        ServerMessage::TabClosed {
            tab_id: 4,
            new_active_tab_id: 1,
        },
        ServerMessage::Refresh,
    ];

    for msg in messages {
        let encoded = serialize(&msg).expect("serialize failed");
        let decoded: ServerMessage = deserialize(&encoded).expect("deserialize failed");
        assert_eq!(format!("{:?}", msg), format!("{:?}", decoded));
    }
}

#[test]
fn framing_roundtrip() {
    let payload = b"hello frame";
    let framed = frame_message(payload);
    assert_eq!(framed.len(), 4 + payload.len());

    let (decoded, remaining) = unframe_message(&framed)
        .expect("unframe failed")
        .expect("frame should be complete");
    assert_eq!(decoded, payload);
    assert!(remaining.is_empty());
}

#[test]
fn partial_frames_wait_for_more_data() {
    let framed = frame_message(b"payload");

    assert!(unframe_message(&framed[..2]).unwrap().is_none());
    assert!(unframe_message(&framed[..6]).unwrap().is_none());
    assert!(unframe_message(&framed[..framed.len() - 1])
        .unwrap()
        .is_none());
}

#[test]
fn concatenated_frames_unframe_in_order() {
    let mut buffer = frame_message(b"first");
    buffer.extend_from_slice(&frame_message(b"second"));

    let (first, rest) = unframe_message(&buffer).unwrap().unwrap();
    assert_eq!(first, b"first");
    let (second, rest) = unframe_message(rest).unwrap().unwrap();
    assert_eq!(second, b"second");
    assert!(rest.is_empty());
}

#[test]
fn oversized_frames_are_rejected() {
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&(MAX_MESSAGE_SIZE + 1).to_be_bytes());
    buffer.extend_from_slice(&[0u8; 16]);

    assert!(unframe_message(&buffer).is_err());
}

#[test]
fn serialize_and_frame_produces_a_decodable_frame() {
    let msg = ClientMessage::Kill {
        tab_id: 1,
        terminal_id: 0,
    };
    let framed = serialize_and_frame(&msg).expect("serialize_and_frame failed");

    let (payload, _) = unframe_message(&framed).unwrap().unwrap();
    let decoded: ClientMessage = deserialize(&payload).expect("deserialize failed");
    assert_eq!(format!("{:?}", msg), format!("{:?}", decoded));
}

proptest! {
    #[test]
    fn framing_roundtrips_arbitrary_payloads(
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
        trailer in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut buffer = frame_message(&payload);
        buffer.extend_from_slice(&trailer);

        let (decoded, remaining) = unframe_message(&buffer)
            .expect("unframe should not error")
            .expect("complete frame expected");
        prop_assert_eq!(decoded, payload);
        prop_assert_eq!(remaining, trailer.as_slice());
    }

    #[test]
    fn truncated_frames_never_panic(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        cut in 0usize..4,
    ) {
        let framed = frame_message(&payload);
        let keep = framed.len().saturating_sub(1 + cut);
        prop_assert!(unframe_message(&framed[..keep]).unwrap().is_none());
    }
}
