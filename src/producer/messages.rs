//! Conversation history as received from the client and as sent to models.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// A client-side message: a role and a sequence of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<UiMessagePart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiMessagePart {
    Text { text: String },
    /// Any part kind the relay does not interpret (tool calls, files, data parts).
    #[serde(other)]
    Other,
}

impl UiMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::User,
            parts: vec![UiMessagePart::Text { text: text.into() }],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: None,
            role: Role::Assistant,
            parts: vec![UiMessagePart::Text { text: text.into() }],
        }
    }

    /// Concatenation of the text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                UiMessagePart::Text { text } => Some(text.as_str()),
                UiMessagePart::Other => None,
            })
            .collect()
    }
}

/// A message as passed to a language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: String,
}

impl ModelMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Convert client messages to model messages, dropping messages without text.
pub fn to_model_messages(messages: &[UiMessage]) -> Vec<ModelMessage> {
    messages
        .iter()
        .filter_map(|m| {
            let content = m.text();
            (!content.is_empty()).then(|| ModelMessage::new(m.role, content))
        })
        .collect()
}

/// Render history as `role: text` lines for embedding in a prompt.
pub fn format_history(messages: &[UiMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_text_parts_are_ignored() {
        let raw = r#"{
            "id": "m1",
            "role": "user",
            "parts": [
                { "type": "text", "text": "Hello " },
                { "type": "file", "url": "x.png" },
                { "type": "text", "text": "there" }
            ]
        }"#;
        let msg: UiMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.text(), "Hello there");
    }

    #[test]
    fn test_format_history() {
        let history = vec![UiMessage::user("hi"), UiMessage::assistant("hello")];
        assert_eq!(format_history(&history), "user: hi\nassistant: hello");
    }

    #[test]
    fn test_to_model_messages_skips_empty() {
        let mut empty = UiMessage::user("");
        empty.parts.clear();
        let history = vec![empty, UiMessage::user("question")];
        assert_eq!(to_model_messages(&history), vec![ModelMessage::user("question")]);
    }
}
