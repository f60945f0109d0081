//! Deterministic in-process language model.
//!
//! Serves queued scripts in order. With an empty queue it synthesizes a
//! response: an instance of the request's JSON schema for structured
//! requests, otherwise an echo of the last user message. Output is split
//! into fixed-size chunks, optionally paced by a delay.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::producer::model::{LanguageModel, ModelRequest};
use crate::producer::{ProducerError, TextDeltaStream};

/// One canned response.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    Text(String),
    /// Serve `chunks` verbatim, then fail with `message`.
    FailAfter { chunks: Vec<String>, message: String },
}

impl Script {
    pub fn text(text: impl Into<String>) -> Self {
        Script::Text(text.into())
    }

    pub fn fail_after<I, S>(chunks: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::FailAfter {
            chunks: chunks.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

pub struct ScriptedModel {
    id: String,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ModelRequest>>,
    chunk_chars: usize,
    chunk_delay: Option<Duration>,
    served: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 8,
            chunk_delay: None,
            served: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_chunking(mut self, chunk_chars: usize, chunk_delay: Option<Duration>) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn with_script(self, script: Script) -> Self {
        self.push(script);
        self
    }

    /// Queue a response for a later call.
    pub fn push(&self, script: Script) {
        self.scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(script);
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of chunks handed to consumers so far, across all calls.
    pub fn chunks_served(&self) -> usize {
        self.served.load(Ordering::Relaxed)
    }

    fn next_script(&self, request: &ModelRequest) -> Script {
        let queued = self
            .scripts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        queued.unwrap_or_else(|| Script::Text(synthesize(request)))
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stream_text(&self, request: ModelRequest) -> TextDeltaStream {
        let script = self.next_script(&request);
        debug!(model = self.id, messages = request.messages.len(), "Scripted model call");
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let items: Vec<Result<String, ProducerError>> = match script {
            Script::Text(text) => split_chunks(&text, self.chunk_chars)
                .into_iter()
                .map(Ok)
                .collect(),
            Script::FailAfter { chunks, message } => chunks
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(ProducerError::Upstream(message))))
                .collect(),
        };

        let served = self.served.clone();
        let delay = self.chunk_delay;
        stream::iter(items)
            .then(move |item| {
                let served = served.clone();
                async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    if item.is_ok() {
                        served.fetch_add(1, Ordering::Relaxed);
                    }
                    item
                }
            })
            .boxed()
    }
}

fn split_chunks(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

fn synthesize(request: &ModelRequest) -> String {
    let topic = request.last_user_text().unwrap_or("nothing in particular");
    match &request.schema {
        Some(schema) => instance_of(schema, topic).to_string(),
        None => format!("You asked about: {topic}"),
    }
}

/// Build a value conforming to a (subset of) JSON schema.
fn instance_of(schema: &Value, topic: &str) -> Value {
    match schema.get("type").and_then(Value::as_str) {
        Some("object") => {
            let mut map = Map::new();
            if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
                for (name, sub) in properties {
                    map.insert(name.clone(), instance_of(sub, topic));
                }
            }
            Value::Object(map)
        }
        Some("array") => {
            let items = schema.get("items").cloned().unwrap_or(Value::Null);
            (1..=3)
                .map(|i| instance_of(&items, &format!("{topic} ({i})")))
                .collect()
        }
        Some("string") => Value::String(topic.to_string()),
        Some("integer" | "number") => Value::from(0),
        Some("boolean") => Value::Bool(false),
        _ => Value::Null,
    }
}
