//! Inbound chat events and the transport handle

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A message posted in a group chat, as delivered by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessageEvent {
    /// Transport-assigned message id
    pub message_id: i64,
    /// Group the message was posted in
    pub group_id: i64,
    /// Sender's user id
    pub user_id: i64,
    /// Sender display name, when the transport provides one
    pub sender_nickname: Option<String>,
    /// Plain-text rendering of the message
    pub plain_text: String,
    /// Unix timestamp
    pub time: i64,
    /// Raw transport payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl GroupMessageEvent {
    /// Create a plain text group message
    pub fn text(group_id: i64, user_id: i64, plain_text: &str) -> Self {
        Self {
            message_id: 0,
            group_id,
            user_id,
            sender_nickname: None,
            plain_text: plain_text.to_string(),
            time: chrono::Utc::now().timestamp(),
            raw: None,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = message_id;
        self
    }
}

/// Per-conversation scratch state owned by the host and threaded through
/// the dispatch handler. Its contents are opaque here.
pub type ConversationState = HashMap<String, serde_json::Value>;

/// Identity of a connected transport account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BotId(pub String);

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live connection to the chat transport.
///
/// Handed to the message sender when the transport connects and passed
/// along with every dispatched event.
pub trait BotHandle: Send + Sync + fmt::Debug {
    /// Account the connection belongs to
    fn id(&self) -> BotId;
}

/// Transport handle for a local, in-process session
#[derive(Debug, Clone)]
pub struct LocalBot {
    id: BotId,
}

impl LocalBot {
    pub fn new(id: &str) -> Self {
        Self {
            id: BotId(id.to_string()),
        }
    }
}

impl BotHandle for LocalBot {
    fn id(&self) -> BotId {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_without_raw() {
        let json = r#"{
            "message_id": 7,
            "group_id": 1001,
            "user_id": 42,
            "sender_nickname": "alice",
            "plain_text": "hi meg",
            "time": 1700000000
        }"#;

        let event: GroupMessageEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.message_id, 7);
        assert_eq!(event.sender_nickname.as_deref(), Some("alice"));
        assert!(event.raw.is_none());
    }

    #[test]
    fn test_local_bot_id() {
        let bot = LocalBot::new("10001");
        assert_eq!(bot.id(), BotId("10001".to_string()));
        assert_eq!(bot.id().to_string(), "10001");
    }
}
