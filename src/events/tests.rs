use super::*;
use serde_json::json;

fn text_event(text: &str, token: &str) -> Value {
    json!({
        "type": "message",
        "mode": "active",
        "timestamp": 1_625_665_242_211_i64,
        "webhookEventId": "01FZ74A0TDDPYRVKNK77XKC3ZR",
        "deliveryContext": {"isRedelivery": false},
        "source": {"type": "user", "userId": "U4af4980629"},
        "replyToken": token,
        "message": {"type": "text", "id": "444573844083572737", "text": text}
    })
}

fn body(events: &[Value]) -> Vec<u8> {
    serde_json::to_vec(&json!({"destination": "Uxxxxxxxx", "events": events})).unwrap()
}

#[test]
fn test_decode_text_message() {
    let batch = decode_events(&body(&[text_event("hello", "tok-1")])).unwrap();
    assert_eq!(batch.destination.as_deref(), Some("Uxxxxxxxx"));
    assert_eq!(batch.len(), 1);

    let event = batch.events.into_iter().next().unwrap().unwrap();
    assert_eq!(
        event.kind,
        EventKind::TextMessage {
            message_id: "444573844083572737".into(),
            text: "hello".into()
        }
    );
    assert_eq!(event.reply_token, Some(ReplyToken::new("tok-1")));
    assert_eq!(
        event.source,
        EventSource::User {
            user_id: "U4af4980629".into()
        }
    );
    assert_eq!(event.timestamp.timestamp_millis(), 1_625_665_242_211);
    assert!(!event.is_redelivery);
}

#[test]
fn test_decode_preserves_text_verbatim() {
    let batch = decode_events(&body(&[text_event("!echo  test  ", "t")])).unwrap();
    let event = batch.events.into_iter().next().unwrap().unwrap();
    match event.kind {
        EventKind::TextMessage { text, .. } => assert_eq!(text, "!echo  test  "),
        other => panic!("unexpected kind: {:?}", other),
    }
}

#[test]
fn test_decode_sticker_and_image() {
    let sticker = json!({
        "type": "message",
        "timestamp": 1,
        "source": {"type": "group", "groupId": "Ca56f94637c", "userId": "U4af4980629"},
        "replyToken": "tok-s",
        "message": {"type": "sticker", "id": "1", "packageId": "446", "stickerId": "1988", "stickerResourceType": "STATIC"}
    });
    let image = json!({
        "type": "message",
        "timestamp": 2,
        "source": {"type": "room", "roomId": "Ra8dbf4673c"},
        "replyToken": "tok-i",
        "message": {
            "type": "image",
            "id": "2",
            "contentProvider": {"type": "external", "originalContentUrl": "https://example.com/a.jpg"}
        }
    });
    let batch = decode_events(&body(&[sticker, image])).unwrap();
    let mut events = batch.events.into_iter();

    let s = events.next().unwrap().unwrap();
    assert_eq!(
        s.kind,
        EventKind::StickerMessage {
            message_id: "1".into(),
            package_id: "446".into(),
            sticker_id: "1988".into()
        }
    );
    assert!(s.source.is_multi_party());
    assert!(matches!(
        &s.source,
        EventSource::Group { group_id, .. } if group_id == "Ca56f94637c"
    ));

    let i = events.next().unwrap().unwrap();
    assert_eq!(
        i.kind,
        EventKind::ImageMessage {
            message_id: "2".into(),
            content: ImageContent::External {
                original_url: Some("https://example.com/a.jpg".into()),
                preview_url: None
            }
        }
    );
    assert_eq!(
        i.source,
        EventSource::Room {
            room_id: "Ra8dbf4673c".into(),
            user_id: None
        }
    );
}

#[test]
fn test_decode_image_defaults_to_line_content() {
    let image = json!({
        "type": "message",
        "timestamp": 2,
        "replyToken": "tok-i",
        "message": {"type": "image", "id": "9", "contentProvider": {"type": "line"}}
    });
    let batch = decode_events(&body(&[image])).unwrap();
    let event = batch.events.into_iter().next().unwrap().unwrap();
    assert!(matches!(
        event.kind,
        EventKind::ImageMessage {
            content: ImageContent::Line,
            ..
        }
    ));
    assert_eq!(event.source, EventSource::Unknown);
}

#[test]
fn test_decode_join_and_unknown_types() {
    let join = json!({
        "type": "join",
        "timestamp": 3,
        "source": {"type": "group", "groupId": "C1"},
        "replyToken": "tok-j"
    });
    let follow = json!({"type": "follow", "timestamp": 4, "source": {"type": "user", "userId": "U1"}, "replyToken": "tok-f"});
    let video = json!({
        "type": "message",
        "timestamp": 5,
        "replyToken": "tok-v",
        "message": {"type": "video", "id": "7", "duration": 1000}
    });
    let batch = decode_events(&body(&[join, follow, video])).unwrap();
    let kinds: Vec<EventKind> = batch.events.into_iter().map(|e| e.unwrap().kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Join,
            EventKind::Other {
                event_type: "follow".into()
            },
            EventKind::Other {
                event_type: "message/video".into()
            },
        ]
    );
}

#[test]
fn test_malformed_event_is_isolated() {
    let broken = json!({
        "type": "message",
        "timestamp": 1,
        "replyToken": "tok-x",
        "message": {"type": "text", "id": "5"}
    });
    let batch = decode_events(&body(&[
        text_event("first", "a"),
        broken,
        text_event("third", "c"),
    ]))
    .unwrap();

    assert_eq!(batch.len(), 3);
    assert!(batch.events[0].is_ok());
    assert!(matches!(
        batch.events[1],
        Err(LinehookError::MalformedEvent { index: 1, .. })
    ));
    assert!(batch.events[2].is_ok());
}

#[test]
fn test_event_without_timestamp_is_malformed() {
    let batch = decode_events(&body(&[json!({"type": "join"})])).unwrap();
    assert!(matches!(
        batch.events[0],
        Err(LinehookError::MalformedEvent { index: 0, .. })
    ));
}

#[test]
fn test_unknown_source_type_does_not_fail_event() {
    let event = json!({
        "type": "message",
        "timestamp": 1,
        "source": {"type": "space", "spaceId": "S1"},
        "replyToken": "t",
        "message": {"type": "text", "id": "1", "text": "hi"}
    });
    let batch = decode_events(&body(&[event])).unwrap();
    let event = batch.events.into_iter().next().unwrap().unwrap();
    assert_eq!(event.source, EventSource::Unknown);
}

#[test]
fn test_redelivery_flag() {
    let mut event = text_event("again", "t");
    event["deliveryContext"]["isRedelivery"] = json!(true);
    let batch = decode_events(&body(&[event])).unwrap();
    assert!(batch.events[0].as_ref().unwrap().is_redelivery);
}

#[test]
fn test_empty_events_array() {
    let batch = decode_events(br#"{"destination":"U1","events":[]}"#).unwrap();
    assert!(batch.is_empty());
}

#[test]
fn test_top_level_not_object_is_malformed_payload() {
    let cases: [&[u8]; 4] = [
        b"not json",
        b"[]",
        br#"{"destination":"U1"}"#,
        br#"{"events":{}}"#,
    ];
    for raw in cases {
        let err = decode_events(raw).unwrap_err();
        assert!(
            matches!(err, LinehookError::MalformedPayload(_)),
            "{:?}",
            raw
        );
    }
}

#[test]
fn test_dedup_key_prefers_webhook_event_id() {
    let batch = decode_events(&body(&[text_event("x", "t")])).unwrap();
    let event = batch.events.into_iter().next().unwrap().unwrap();
    assert_eq!(
        event.dedup_key().as_deref(),
        Some("evt_01FZ74A0TDDPYRVKNK77XKC3ZR")
    );
}

#[test]
fn test_dedup_key_falls_back_to_message_id() {
    let mut raw = text_event("x", "t");
    raw.as_object_mut().unwrap().remove("webhookEventId");
    let batch = decode_events(&body(&[raw])).unwrap();
    let event = batch.events.into_iter().next().unwrap().unwrap();
    assert_eq!(event.dedup_key().as_deref(), Some("msg_444573844083572737"));

    let join = json!({"type": "join", "timestamp": 1});
    let batch = decode_events(&body(&[join])).unwrap();
    assert_eq!(batch.events[0].as_ref().unwrap().dedup_key(), None);
}

#[test]
fn test_kind_labels() {
    assert_eq!(EventKind::Join.label(), "join");
    assert_eq!(
        EventKind::Other {
            event_type: "postback".into()
        }
        .label(),
        "postback"
    );
}
