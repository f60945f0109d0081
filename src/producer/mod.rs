//! Upstream producers feeding relay sessions.
//!
//! - [`model`]: Language model seam, requests, structured-object streaming
//! - [`messages`]: Conversation history at the request boundary
//! - [`partial_json`]: Tolerant parsing of incomplete JSON documents
//! - [`ui_stream`]: Text delta stream to foreign part stream conversion
//! - [`scripted`]: Deterministic in-process model
//! - [`search`]: Search seam and ordered fan-out

pub mod messages;
pub mod model;
pub mod partial_json;
pub mod scripted;
pub mod search;
pub mod ui_stream;

use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

pub use messages::{ModelMessage, Role, UiMessage};
pub use model::{stream_object, LanguageModel, ModelRequest, SharedModel};
pub use scripted::{Script, ScriptedModel};
pub use search::{search_all, QueryResults, SearchHit, SearchProvider, SharedSearch, StubSearch};
pub use ui_stream::{text_ui_stream, TextStream, UiStreamOptions};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    #[error("upstream call failed: {0}")]
    Upstream(String),

    #[error("malformed model output: {0}")]
    Malformed(String),

    #[error("producer was cancelled")]
    Cancelled,
}

/// Lazy, finite sequence of text deltas.
pub type TextDeltaStream = BoxStream<'static, Result<String, ProducerError>>;

/// Lazy, finite sequence of partial-object snapshots.
pub type ObjectStream = BoxStream<'static, Result<Value, ProducerError>>;
