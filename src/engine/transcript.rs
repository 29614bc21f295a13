// src/engine/transcript.rs — Ordered conversation messages

use chrono::{DateTime, Utc};

use super::types::{Message, Role};

pub const WELCOME_ID: &str = "welcome";

const WELCOME_TEXT: &str = "Hi! I'm your trading coach. Ask me about your performance, \
and I'll dig through your journal to find what's working and what isn't.";

const WELCOME_SUGGESTIONS: [&str; 4] = [
    "Run forensic analysis on my losses",
    "What is my best performing setup?",
    "How does my win rate change by time of day?",
    "Where am I giving back profits?",
];

/// The transcript a brand-new conversation starts with.
///
/// Deterministic, so two fresh transcripts always compare equal.
pub fn welcome_message() -> Message {
    Message {
        id: WELCOME_ID.to_string(),
        role: Role::Assistant,
        content: WELCOME_TEXT.to_string(),
        timestamp: DateTime::<Utc>::UNIX_EPOCH,
        suggestions: None,
        operations: None,
    }
    .with_suggestions(WELCOME_SUGGESTIONS.iter().map(|s| s.to_string()).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::fresh()
    }
}

impl Transcript {
    pub fn fresh() -> Self {
        Self {
            messages: vec![welcome_message()],
        }
    }

    /// Transcript rebuilt from stored history. Empty history means a fresh conversation.
    pub fn from_history(messages: Vec<Message>) -> Self {
        if messages.is_empty() {
            Self::fresh()
        } else {
            Self { messages }
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Swap in a new value for the message with `id`. Returns false if absent.
    pub fn replace(&mut self, id: &str, message: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        }
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn is_fresh(&self) -> bool {
        self.messages.len() == 1 && self.messages[0].id == WELCOME_ID
    }
}
