//! Message types
//!
//! Defines chat roles, messages and the validated [`Conversation`] handed to the
//! prompt formatter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// Message from the user
    User,
    /// Message from the AI assistant
    Assistant,
}

impl Role {
    /// Parses a wire role name. Matching is exact and case-sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The content of the message
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Reasons a raw message list is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Invalid message format. Each message must have 'role' and 'content' fields.")]
    InvalidMessage { index: usize },

    #[error("Invalid role: '{role}'. Must be 'system', 'user', or 'assistant'.")]
    InvalidRole { index: usize, role: String },
}

/// An ordered, validated list of messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Validates raw JSON messages.
    ///
    /// Every element must be an object with a string `role` and a string
    /// `content`; the role must be one of `system`, `user` or `assistant`.
    /// Messages are checked in order and the first offending one is reported.
    pub fn from_values(values: &[Value]) -> Result<Self, ConversationError> {
        let mut messages = Vec::with_capacity(values.len());

        for (index, value) in values.iter().enumerate() {
            let object = value
                .as_object()
                .ok_or(ConversationError::InvalidMessage { index })?;
            let (Some(role), Some(content)) = (object.get("role"), object.get("content")) else {
                return Err(ConversationError::InvalidMessage { index });
            };

            let role = match role.as_str().and_then(Role::parse) {
                Some(role) => role,
                None => {
                    let role = role
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| role.to_string());
                    return Err(ConversationError::InvalidRole { index, role });
                }
            };

            let content = content
                .as_str()
                .ok_or(ConversationError::InvalidMessage { index })?;

            messages.push(Message::new(role, content));
        }

        Ok(Self { messages })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Content of the first system message, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}
