//! Language model seam.
//!
//! A model turns a request into a lazy stream of text deltas. Structured
//! output is layered on top: the deltas are accumulated as JSON text and
//! re-parsed after each one into partial-object snapshots.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::producer::messages::{ModelMessage, Role};
use crate::producer::partial_json::parse_partial;
use crate::producer::{ObjectStream, ProducerError, TextDeltaStream};

/// A request to a language model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    /// JSON schema the response must conform to (structured output).
    pub schema: Option<Value>,
}

impl ModelRequest {
    pub fn new(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// A single user message.
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self::new(vec![ModelMessage::user(prompt)])
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier (e.g. "flash-lite").
    fn id(&self) -> &str;

    /// Stream the response as text deltas.
    fn stream_text(&self, request: ModelRequest) -> TextDeltaStream;

    /// Generate the whole response at once.
    async fn generate_text(&self, request: ModelRequest) -> Result<String, ProducerError> {
        let mut deltas = self.stream_text(request);
        let mut text = String::new();
        while let Some(delta) = deltas.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }
}

pub type SharedModel = Arc<dyn LanguageModel>;

struct ObjectState {
    deltas: TextDeltaStream,
    buffer: String,
    last: Option<Value>,
    done: bool,
}

/// Stream a structured response as successive partial-object snapshots.
///
/// A snapshot is yielded only when it differs from the previous one. When
/// the deltas end, the full text must parse as JSON; otherwise the stream
/// ends with [`ProducerError::Malformed`].
pub fn stream_object(model: &dyn LanguageModel, request: ModelRequest) -> ObjectStream {
    let state = ObjectState {
        deltas: model.stream_text(request),
        buffer: String::new(),
        last: None,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            match st.deltas.next().await {
                Some(Ok(delta)) => {
                    st.buffer.push_str(&delta);
                    match parse_partial(&st.buffer) {
                        Ok(Some(snapshot)) if st.last.as_ref() != Some(&snapshot) => {
                            st.last = Some(snapshot.clone());
                            return Some((Ok(snapshot), st));
                        }
                        Ok(_) => continue,
                        Err(e) => {
                            st.done = true;
                            return Some((Err(ProducerError::Malformed(e.to_string())), st));
                        }
                    }
                }
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.done = true;
                    return match serde_json::from_str::<Value>(st.buffer.trim()) {
                        Ok(complete) if st.last.as_ref() == Some(&complete) => None,
                        Ok(complete) => Some((Ok(complete), st)),
                        Err(e) => Some((Err(ProducerError::Malformed(e.to_string())), st)),
                    };
                }
            }
        }
    })
    .boxed()
}
