use serde::{Deserialize, Serialize};

/// Kind tag the server puts on broadcast frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    UserMessage,
    AiResponse,
    #[serde(other)]
    Other,
}

/// The JSON envelope exchanged over the chat socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub content: String,
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<String>,
}

impl Message {
    /// Build a message to send, tagged with a fresh v4 id.
    pub fn outgoing(sender: &str, content: &str) -> Self {
        Self {
            sender: sender.to_string(),
            content: content.to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            kind: None,
            recipient: None,
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// True when this is the AI's reply to something `username` sent.
    pub fn is_ai_response_for(&self, username: &str) -> bool {
        self.kind == Some(MessageKind::AiResponse) && self.recipient.as_deref() == Some(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_message_has_only_core_fields() {
        let msg = Message::outgoing("alice", "hello");
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        let obj = value.as_object().unwrap();

        assert_eq!(obj.len(), 3);
        assert_eq!(obj["sender"], "alice");
        assert_eq!(obj["content"], "hello");
        assert!(uuid::Uuid::parse_str(obj["id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn outgoing_ids_are_unique() {
        let a = Message::outgoing("alice", "same");
        let b = Message::outgoing("alice", "same");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn parses_ai_response_frame() {
        let text = r#"{"type":"ai_response","sender":"AI","recipient":"alice","content":"Hi!","id":"42"}"#;
        let msg = Message::from_json(text).unwrap();

        assert_eq!(msg.kind, Some(MessageKind::AiResponse));
        assert_eq!(msg.recipient.as_deref(), Some("alice"));
        assert!(msg.is_ai_response_for("alice"));
        assert!(!msg.is_ai_response_for("bob"));
    }

    #[test]
    fn parses_user_broadcast_without_recipient() {
        let text = r#"{"type":"user_message","sender":"bob","content":"yo","id":"7"}"#;
        let msg = Message::from_json(text).unwrap();

        assert_eq!(msg.kind, Some(MessageKind::UserMessage));
        assert_eq!(msg.recipient, None);
        assert!(!msg.is_ai_response_for("bob"));
    }

    #[test]
    fn unknown_type_is_kept_as_other() {
        let text = r#"{"type":"typing","sender":"bob","content":"","id":"1"}"#;
        let msg = Message::from_json(text).unwrap();
        assert_eq!(msg.kind, Some(MessageKind::Other));
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(Message::from_json(r#"{"sender":"bob","content":"x"}"#).is_err());
    }
}
