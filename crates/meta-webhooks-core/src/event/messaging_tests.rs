//! Tests for messaging classification.

use super::*;
use serde_json::json;

fn header() -> Value {
    json!({
        "sender": { "id": "567" },
        "recipient": { "id": "123" },
        "timestamp": 1569262485349_i64
    })
}

fn with_header(extra: Value) -> Value {
    let mut value = header();
    if let (Some(target), Value::Object(fields)) = (value.as_object_mut(), extra) {
        target.extend(fields);
    }
    value
}

#[test]
fn test_text_message() {
    let value = with_header(json!({ "message": { "mid": "890", "text": "hello" } }));

    let messaging = Messaging::decode("123", 0, &value).unwrap();

    match &messaging {
        Messaging::Message(event) => {
            assert_eq!(event.header.sender.id, "567");
            assert_eq!(event.header.recipient.id, "123");
            assert_eq!(event.header.timestamp, 1569262485349);
            assert_eq!(event.message.id, "890");
            assert_eq!(event.message.text, "hello");
            assert!(!event.message.is_echo);
        }
        other => panic!("expected message, got {other:?}"),
    }
    assert_eq!(messaging.kind(), "message");
    assert_eq!(messaging.header().sender.id, "567");
}

#[test]
fn test_message_attachments() {
    let cases = [
        ("story_mention", json!({ "url": "<CDN_URL>" })),
        ("reel", json!({ "url": "<CDN_URL>", "title": "reel title", "reel_video_id": "123" })),
        ("ig_reel", json!({ "url": "<CDN_URL>", "title": "reel title", "reel_video_id": "123" })),
    ];

    for (kind, payload) in cases {
        let value = with_header(json!({
            "message": {
                "mid": "890",
                "attachments": [{ "type": kind, "payload": payload }]
            }
        }));

        let Messaging::Message(event) = Messaging::decode("123", 0, &value).unwrap() else {
            panic!("{kind} attachment was not classified as a message");
        };
        let attachment = &event.message.attachments[0];
        assert_eq!(attachment.kind, kind);
        assert_eq!(attachment.payload.url, "<CDN_URL>");
        assert_eq!(attachment.payload.sticker_id, "");
        if kind != "story_mention" {
            assert_eq!(attachment.payload.reel_video_id, "123");
            assert_eq!(attachment.payload.title, "reel title");
        }
    }
}

#[test]
fn test_message_reply_and_quick_reply() {
    let value = with_header(json!({
        "message": {
            "mid": "890",
            "text": "Red",
            "quick_reply": { "payload": "COLOR_RED" },
            "reply_to": { "story": { "id": "17", "url": "<CDN_URL>" } }
        }
    }));

    let Messaging::Message(event) = Messaging::decode("123", 0, &value).unwrap() else {
        panic!("expected message");
    };
    assert_eq!(
        event.message.quick_reply,
        Some(QuickReply {
            payload: "COLOR_RED".to_string()
        })
    );
    let reply_to = event.message.reply_to.expect("reply_to decoded");
    assert_eq!(reply_to.id, "");
    assert_eq!(
        reply_to.story,
        Some(StoryReply {
            id: "17".to_string(),
            url: "<CDN_URL>".to_string(),
        })
    );
}

#[test]
fn test_postback() {
    let value = with_header(json!({
        "postback": { "mid": "890", "title": "Get started", "payload": "START" }
    }));

    match Messaging::decode("123", 0, &value).unwrap() {
        Messaging::Postback(event) => {
            assert_eq!(event.postback.id, "890");
            assert_eq!(event.postback.title, "Get started");
            assert_eq!(event.postback.payload, "START");
            assert_eq!(event.postback.referral, None);
        }
        other => panic!("expected postback, got {other:?}"),
    }
}

#[test]
fn test_referral() {
    let value = with_header(json!({
        "referral": {
            "type": "OPEN_THREAD",
            "source": "ADS",
            "ref": "campaign-7",
            "product": { "id": "42" }
        }
    }));

    match Messaging::decode("123", 0, &value).unwrap() {
        Messaging::Referral(event) => {
            assert_eq!(event.referral.kind, "OPEN_THREAD");
            assert_eq!(event.referral.source, "ADS");
            assert_eq!(event.referral.reference, "campaign-7");
            assert_eq!(
                event.referral.product,
                Some(ReferralProduct {
                    id: "42".to_string()
                })
            );
        }
        other => panic!("expected referral, got {other:?}"),
    }
}

#[test]
fn test_message_wins_over_postback_and_referral() {
    let value = with_header(json!({
        "message": { "mid": "890", "text": "hi" },
        "postback": { "mid": "891", "payload": "START" },
        "referral": { "type": "OPEN_THREAD", "source": "ADS" }
    }));

    let messaging = Messaging::decode("123", 0, &value).unwrap();

    assert!(matches!(messaging, Messaging::Message(ref event) if event.message.id == "890"));
}

#[test]
fn test_postback_wins_over_referral() {
    let value = with_header(json!({
        "postback": { "mid": "891" },
        "referral": { "type": "OPEN_THREAD" }
    }));

    assert!(matches!(
        Messaging::decode("123", 0, &value).unwrap(),
        Messaging::Postback(_)
    ));
}

#[test]
fn test_message_without_mid_falls_through() {
    let value = with_header(json!({
        "message": { "text": "no id" },
        "referral": { "type": "OPEN_THREAD" }
    }));

    assert!(matches!(
        Messaging::decode("123", 0, &value).unwrap(),
        Messaging::Referral(_)
    ));
}

#[test]
fn test_unrecognized_shape() {
    let value = with_header(json!({ "read": { "mid": "890" } }));

    let err = Messaging::decode("123", 3, &value).unwrap_err();

    match err {
        DecodeError::UnrecognizedMessagingShape { entry_id, index } => {
            assert_eq!(entry_id, "123");
            assert_eq!(index, 3);
        }
        other => panic!("expected UnrecognizedMessagingShape, got {other:?}"),
    }
}
