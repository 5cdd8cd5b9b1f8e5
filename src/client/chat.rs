//! Chat Feed
//!
//! Append-only collection of `{sender, text}` records next to the game
//! document.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::kv::{ChildItem, ChildSubscription, KeyValueStore, StoreError};

/// Sender recorded when the session has no display name yet.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// One chat record as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sanitized display name.
    pub sender: String,
    /// Message body, as typed.
    pub text: String,
}

impl ChatMessage {
    /// Decode a stored item.
    pub fn from_item(item: &ChildItem) -> Result<Self, serde_json::Error> {
        serde_json::from_value(item.value.clone())
    }

    /// `sender: text`
    pub fn display_line(&self) -> String {
        format!("{}: {}", self.sender, self.text)
    }
}

/// Replace each run of whitespace with `_`; empty names become [`UNKNOWN_SENDER`].
pub fn sanitize_sender(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_space = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    if out.is_empty() {
        UNKNOWN_SENDER.to_string()
    } else {
        out
    }
}

/// True if a key press in the chat input should send: Enter without Shift.
pub fn should_submit(key: &str, shift: bool) -> bool {
    key == "Enter" && !shift
}

/// Handle on the chat collection.
#[derive(Clone)]
pub struct ChatChannel {
    store: Arc<dyn KeyValueStore>,
    path: String,
}

impl ChatChannel {
    /// Create a channel for the collection at `path`.
    pub fn new(store: Arc<dyn KeyValueStore>, path: impl Into<String>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Append a message.
    ///
    /// Blank text is dropped without a store call and returns `Ok(None)`.
    pub async fn send(&self, display_name: &str, text: &str) -> Result<Option<String>, StoreError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let message = ChatMessage {
            sender: sanitize_sender(display_name),
            text: text.to_string(),
        };
        let key = self.store.push(&self.path, serde_json::to_value(&message)?).await?;
        debug!("Chat message {} sent as {}", key, message.sender);
        Ok(Some(key))
    }

    /// Subscribe to messages, existing ones first.
    pub async fn subscribe(&self) -> Result<ChildSubscription, StoreError> {
        self.store.subscribe_children(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_sanitize_sender() {
        assert_eq!(sanitize_sender("Player 1"), "Player_1");
        assert_eq!(sanitize_sender("a \t b"), "a_b");
        assert_eq!(sanitize_sender(""), "Unknown");
        assert_eq!(sanitize_sender("Spectator"), "Spectator");
    }

    #[test]
    fn test_should_submit() {
        assert!(should_submit("Enter", false));
        assert!(!should_submit("Enter", true));
        assert!(!should_submit("a", false));
    }

    #[tokio::test]
    async fn test_blank_message_not_sent() {
        let store = MemoryStore::new();
        let conn = store.connect();
        let chat = ChatChannel::new(Arc::new(conn.clone()), "chat");

        assert_eq!(chat.send("Player 1", "   ").await.unwrap(), None);
        assert_eq!(conn.stats().await.writes, 0);
    }

    #[tokio::test]
    async fn test_messages_reach_other_sessions() {
        let store = MemoryStore::new();
        let alice = ChatChannel::new(Arc::new(store.connect()), "chat");
        let bob = ChatChannel::new(Arc::new(store.connect()), "chat");

        alice.send("Player 1", "hello").await.unwrap();
        let mut feed = bob.subscribe().await.unwrap();
        alice.send("", " gg ").await.unwrap();

        let first = ChatMessage::from_item(&feed.next().await.unwrap()).unwrap();
        let second = ChatMessage::from_item(&feed.next().await.unwrap()).unwrap();
        assert_eq!(first.display_line(), "Player_1: hello");
        assert_eq!(second, ChatMessage { sender: "Unknown".into(), text: " gg ".into() });
    }
}
