use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Identifier of a chat message as assigned by the conversation store.
///
/// Stores use either numeric or textual ids; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Ok(MessageId(s)),
            Raw::Number(n) => Ok(MessageId(n.to_string())),
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author tag of a chat message. The store writes system replies as `ai`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "ai", alias = "system")]
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default = "MessageId::generate")]
    pub id: MessageId,
    pub content: String,
    pub sender: Sender,
    #[serde(default = "Utc::now", alias = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn from_user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: MessageId(id.into()),
            content: content.into(),
            sender: Sender::User,
            created_at: Utc::now(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.sender == Sender::System
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub content: String,
    pub sender: Sender,
    /// Inbound message this reply answers. Not written to the chat store.
    #[serde(skip_serializing, default)]
    pub in_reply_to: Option<MessageId>,
}

impl ReplyMessage {
    pub fn to(message: &InboundMessage, content: String) -> Self {
        Self {
            content,
            sender: Sender::System,
            in_reply_to: Some(message.id.clone()),
        }
    }
}
