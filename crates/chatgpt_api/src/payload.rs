use serde::Serialize;
use serde_json::{json, Value};

/// Request body for the conversation endpoint, shaped the way the web app
/// sends it.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationPayload {
    pub action: String,
    pub messages: Vec<PayloadMessage>,
    /// Backend model slug, not the user-facing model key.
    pub model: String,
    pub parent_message_id: String,
    pub timezone_offset_min: i32,
    pub conversation_mode: Value,
    pub force_paragen: bool,
    pub force_rate_limit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayloadMessage {
    pub id: String,
    pub author: Value,
    pub content: Value,
}

impl ConversationPayload {
    /// Build a single-user-message payload. A fresh parent message id is
    /// generated when the caller does not continue a thread.
    #[must_use]
    pub fn new(
        prompt: &str,
        model_slug: &str,
        conversation_id: Option<&str>,
        parent_message_id: Option<&str>,
    ) -> Self {
        let message = PayloadMessage {
            id: uuid::Uuid::new_v4().to_string(),
            author: json!({ "role": "user" }),
            content: json!({
                "content_type": "text",
                "parts": [prompt],
            }),
        };
        let parent_message_id = parent_message_id
            .filter(|id| !id.trim().is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            action: "next".to_string(),
            messages: vec![message],
            model: model_slug.to_string(),
            parent_message_id,
            timezone_offset_min: -480,
            conversation_mode: json!({ "kind": "primary_assistant" }),
            force_paragen: false,
            force_rate_limit: false,
            conversation_id: conversation_id.map(ToString::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::ConversationPayload;

    #[test]
    fn payload_serializes_into_expected_shape() {
        let payload = ConversationPayload::new("2+2", "gpt-5.2", None, None);
        let value = serde_json::to_value(&payload).expect("payload should serialize");

        assert_eq!(value["action"], "next");
        assert_eq!(value["model"], "gpt-5.2");
        assert_eq!(value["messages"][0]["author"]["role"], "user");
        assert_eq!(value["messages"][0]["content"]["content_type"], "text");
        assert_eq!(value["messages"][0]["content"]["parts"], json!(["2+2"]));
        assert_eq!(value["conversation_mode"]["kind"], "primary_assistant");
        assert_eq!(value.get("conversation_id"), None);
    }

    #[test]
    fn fresh_parent_message_id_when_not_continuing() {
        let payload = ConversationPayload::new("hi", "auto", None, None);
        assert_eq!(payload.parent_message_id.len(), 36);
    }

    #[test]
    fn explicit_thread_ids_are_preserved() {
        let payload =
            ConversationPayload::new("hi", "auto", Some("conv-9"), Some("parent-7"));
        let value: Value = serde_json::to_value(&payload).expect("payload should serialize");

        assert_eq!(value["conversation_id"], "conv-9");
        assert_eq!(value["parent_message_id"], "parent-7");
    }

    #[test]
    fn blank_parent_id_is_replaced() {
        let payload = ConversationPayload::new("hi", "auto", None, Some("  "));
        assert_ne!(payload.parent_message_id.trim(), "");
        assert_eq!(payload.parent_message_id.len(), 36);
    }
}
