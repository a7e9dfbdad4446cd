use botdeck_protocol::{EnginePacket, PacketKind, ProtocolError, SocketPacket, Status};
use serde_json::json;

#[test]
fn test_ping_answered_with_matching_pong() {
    let ping = EnginePacket::decode("2probe").unwrap();
    let EnginePacket::Ping(body) = ping else {
        panic!("expected ping");
    };
    assert_eq!(EnginePacket::Pong(body).encode(), "3probe");
    assert_eq!(EnginePacket::decode("2").unwrap(), EnginePacket::Ping(String::new()));
}

#[test]
fn test_namespaced_event_with_ack_id() {
    let frame = r#"42/api,17["app_update",{"status":"success","message":"Started","data":null}]"#;
    let EnginePacket::Message(body) = EnginePacket::decode(frame).unwrap() else {
        panic!("expected message");
    };
    let packet = SocketPacket::decode(&body).unwrap();
    assert_eq!(packet.kind, PacketKind::Event);
    assert_eq!(packet.namespace, "/api");
    assert_eq!(packet.ack_id, Some(17));

    let (name, arg) = packet.event_parts().expect("event parts");
    assert_eq!(name, "app_update");
    let envelope: botdeck_protocol::Envelope =
        serde_json::from_value(arg.cloned().unwrap()).unwrap();
    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.message.as_deref(), Some("Started"));
}

#[test]
fn test_default_namespace_event() {
    let packet = SocketPacket::decode(r#"2["hello",1]"#).unwrap();
    assert_eq!(packet.namespace, "/");
    assert_eq!(packet.event_parts(), Some(("hello", Some(&json!(1)))));
}

#[test]
fn test_connect_ack_carries_sid() {
    let packet = SocketPacket::decode(r#"0/server,{"sid":"xyz"}"#).unwrap();
    assert_eq!(packet.kind, PacketKind::Connect);
    assert_eq!(packet.namespace, "/server");
    assert_eq!(packet.payload, Some(json!({"sid": "xyz"})));
    assert!(packet.event_parts().is_none());
}

#[test]
fn test_binary_packets_rejected() {
    assert!(matches!(
        SocketPacket::decode(r#"51-/api,["upload",{"_placeholder":true,"num":0}]"#),
        Err(ProtocolError::UnsupportedBinary)
    ));
}

#[test]
fn test_connect_error_decodes_message() {
    let packet = SocketPacket::decode(r#"4/api,{"message":"Not authorized"}"#).unwrap();
    assert_eq!(packet.kind, PacketKind::ConnectError);
    assert_eq!(packet.payload.unwrap()["message"], "Not authorized");
}

#[test]
fn test_event_frame_roundtrips_through_decode() {
    let frame = SocketPacket::event("/api", "app_edit", json!({"appId": "7", "config": {"a": 1}}))
        .to_frame();
    let EnginePacket::Message(body) = EnginePacket::decode(&frame).unwrap() else {
        panic!("expected message");
    };
    let packet = SocketPacket::decode(&body).unwrap();
    let (name, arg) = packet.event_parts().unwrap();
    assert_eq!(name, "app_edit");
    assert_eq!(arg.unwrap()["config"]["a"], 1);
}
