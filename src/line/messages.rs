//! Outbound message payloads for the LINE Messaging API, serialized
//! with the platform's camelCase field names.

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "text")]
    Text {
        text: String,
        #[serde(rename = "quickReply", skip_serializing_if = "Option::is_none")]
        quick_reply: Option<QuickReply>,
    },
    #[serde(rename = "flex")]
    Flex {
        #[serde(rename = "altText")]
        alt_text: String,
        contents: serde_json::Value,
    },
    #[serde(rename = "image")]
    Image {
        #[serde(rename = "originalContentUrl")]
        original_content_url: String,
        #[serde(rename = "previewImageUrl")]
        preview_image_url: String,
    },
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Message::Text {
            text: text.into(),
            quick_reply: None,
        }
    }

    pub fn text_with_quick_reply(text: impl Into<String>, quick_reply: QuickReply) -> Self {
        Message::Text {
            text: text.into(),
            quick_reply: Some(quick_reply),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        Message::Image {
            original_content_url: url.clone(),
            preview_image_url: url,
        }
    }

    /// Rich card for one week's exercise video: hero thumbnail linking
    /// to the video plus a primary button.
    pub fn exercise_video_card(video_url: &str, thumbnail_url: &str) -> Self {
        let bubble = json!({
            "type": "bubble",
            "hero": {
                "type": "image",
                "url": thumbnail_url,
                "size": "full",
                "aspectRatio": "16:9",
                "aspectMode": "cover",
                "action": {"type": "uri", "uri": video_url}
            },
            "body": {
                "type": "box",
                "layout": "vertical",
                "contents": [
                    {
                        "type": "text",
                        "text": "今週の運動メニュー",
                        "weight": "bold",
                        "size": "xl",
                        "color": "#1DB446"
                    },
                    {
                        "type": "text",
                        "text": "動画を見ながら一緒に運動しましょう",
                        "size": "sm",
                        "color": "#999999",
                        "margin": "md"
                    }
                ]
            },
            "footer": {
                "type": "box",
                "layout": "vertical",
                "spacing": "sm",
                "contents": [
                    {
                        "type": "button",
                        "style": "primary",
                        "height": "sm",
                        "action": {"type": "uri", "label": "動画を見る", "uri": video_url}
                    }
                ],
                "flex": 0
            }
        });
        Message::Flex {
            alt_text: "今週の運動メニュー".to_string(),
            contents: bubble,
        }
    }

    /// Short label for activity-log previews.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Text { .. } => "text",
            Message::Flex { .. } => "flex",
            Message::Image { .. } => "image",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickReply {
    pub items: Vec<QuickReplyItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickReplyItem {
    #[serde(rename = "type")]
    pub item_type: &'static str,
    pub action: serde_json::Value,
}

impl QuickReply {
    /// The fixed weekly answer options, mapped to the same bucket
    /// vocabulary as free-text replies.
    pub fn day_count_options() -> Self {
        let items = ["0回", "1~3回", "4~7回"]
            .into_iter()
            .map(|label| QuickReplyItem {
                item_type: "action",
                action: json!({"type": "message", "label": label, "text": label}),
            })
            .collect();
        QuickReply { items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_wire_shape() {
        let msg = Message::text_with_quick_reply("何回できましたか？", QuickReply::day_count_options());
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "text");
        assert_eq!(v["quickReply"]["items"].as_array().unwrap().len(), 3);
        assert_eq!(v["quickReply"]["items"][0]["action"]["text"], "0回");
        assert_eq!(v["quickReply"]["items"][2]["action"]["label"], "4~7回");

        let plain = serde_json::to_value(Message::text("hi")).unwrap();
        assert!(plain.get("quickReply").is_none());
    }

    #[test]
    fn flex_card_links_video_and_thumbnail() {
        let msg = Message::exercise_video_card("https://v.example/w1", "https://t.example/w1.jpg");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["type"], "flex");
        assert_eq!(v["altText"], "今週の運動メニュー");
        assert_eq!(v["contents"]["hero"]["url"], "https://t.example/w1.jpg");
        assert_eq!(v["contents"]["hero"]["action"]["uri"], "https://v.example/w1");
        assert_eq!(
            v["contents"]["footer"]["contents"][0]["action"]["uri"],
            "https://v.example/w1"
        );
    }

    #[test]
    fn image_message_duplicates_url_for_preview() {
        let v = serde_json::to_value(Message::image("https://i.example/w1.jpg")).unwrap();
        assert_eq!(v["type"], "image");
        assert_eq!(v["originalContentUrl"], v["previewImageUrl"]);
    }
}
