//! Ordered conversation log.
//!
//! Messages are only ever appended. The one exception to immutability is the
//! assistant message currently being streamed, whose content may grow until
//! [`Transcript::finish_stream`] freezes it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use llm_core::{Content, ContentRole};
use serde::Serialize;
use uuid::Uuid;

/// Time-ordered unique message id (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for MessageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Role name the generation provider expects.
    pub fn provider_role(self) -> ContentRole {
        match self {
            Role::User => ContentRole::User,
            Role::Assistant => ContentRole::Model,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Index of the assistant message whose content is still growing.
    streaming: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the assistant's greeting, unless it is blank.
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::new();
        if !greeting.trim().is_empty() {
            transcript.push(Role::Assistant, greeting);
        }
        transcript
    }

    /// Append a finished message.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        debug_assert!(self.streaming.is_none(), "push while a reply is streaming");
        let message = Message::new(role, content.into());
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Append an empty assistant message that chunks will grow.
    pub fn begin_assistant(&mut self) -> MessageId {
        self.finish_stream();
        let message = Message::new(Role::Assistant, String::new());
        let id = message.id;
        self.messages.push(message);
        self.streaming = Some(self.messages.len() - 1);
        id
    }

    /// Append `text` to the in-flight assistant message. Returns `None` when
    /// nothing is streaming, in which case the chunk is dropped.
    pub fn append_chunk(&mut self, text: &str) -> Option<MessageId> {
        let index = self.streaming?;
        let message = &mut self.messages[index];
        message.content.push_str(text);
        Some(message.id)
    }

    /// Freeze the in-flight message, if any.
    pub fn finish_stream(&mut self) -> Option<MessageId> {
        self.streaming
            .take()
            .map(|index| self.messages[index].id)
    }

    pub fn in_flight(&self) -> Option<MessageId> {
        self.streaming.map(|index| self.messages[index].id)
    }

    /// Every message so far in provider shape. Empty messages (a reply that
    /// failed before its first chunk) are left out.
    pub fn history(&self) -> Vec<Content> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| Content::text(m.role.provider_role(), m.content.clone()))
            .collect()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
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
}
