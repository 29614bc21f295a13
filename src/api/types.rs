// src/api/types.rs — Wire shapes for the conversation endpoints

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::types::{Message, Operation, Role};
use crate::infra::session::Session;

/// `GET conversations` answers with a bare array or a wrapped one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ConversationList {
    Bare(Vec<Session>),
    Wrapped { conversations: Vec<Session> },
}

impl ConversationList {
    pub fn into_sessions(self) -> Vec<Session> {
        match self {
            ConversationList::Bare(s) => s,
            ConversationList::Wrapped { conversations } => conversations,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageList {
    Bare(Vec<StoredMessage>),
    Wrapped { messages: Vec<StoredMessage> },
}

impl MessageList {
    pub fn into_messages(self) -> Vec<Message> {
        let stored = match self {
            MessageList::Bare(m) => m,
            MessageList::Wrapped { messages } => messages,
        };
        stored.into_iter().map(Message::from).collect()
    }
}

/// One persisted message. The server may omit the id.
#[derive(Debug, Deserialize)]
pub struct StoredMessage {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(alias = "created_at")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
    #[serde(default)]
    pub operations: Option<Vec<Operation>>,
}

impl From<StoredMessage> for Message {
    fn from(m: StoredMessage) -> Self {
        Message {
            id: m
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: m.role,
            content: m.content,
            timestamp: m.timestamp,
            suggestions: m.suggestions,
            operations: m.operations,
        }
    }
}
