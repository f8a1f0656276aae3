//! Inbound webhook payload. One POST carries a batch of events; only
//! follow events and text messages drive the progression logic, the
//! rest is ignored.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WebhookBatch {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "follow")]
    Follow {
        #[serde(rename = "replyToken")]
        reply_token: String,
        source: EventSource,
    },
    #[serde(rename = "message")]
    Message {
        #[serde(rename = "replyToken")]
        reply_token: String,
        source: EventSource,
        message: MessageContent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct EventSource {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum MessageContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_message_event() {
        let raw = r#"{
            "destination": "U000",
            "events": [{
                "type": "message",
                "replyToken": "tok-1",
                "source": {"type": "user", "userId": "U123"},
                "message": {"type": "text", "id": "1", "text": "b"}
            }]
        }"#;
        let batch: WebhookBatch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.events.len(), 1);
        match &batch.events[0] {
            WebhookEvent::Message {
                reply_token,
                source,
                message: MessageContent::Text { text },
            } => {
                assert_eq!(reply_token, "tok-1");
                assert_eq!(source.user_id.as_deref(), Some("U123"));
                assert_eq!(text, "b");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_and_message_types_are_tolerated() {
        let raw = r#"{
            "events": [
                {"type": "unfollow", "source": {"userId": "U1"}},
                {"type": "message", "replyToken": "t", "source": {"userId": "U1"},
                 "message": {"type": "sticker", "packageId": "1"}}
            ]
        }"#;
        let batch: WebhookBatch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert!(matches!(batch.events[0], WebhookEvent::Other));
        assert!(matches!(
            batch.events[1],
            WebhookEvent::Message {
                message: MessageContent::Other,
                ..
            }
        ));
    }
}
