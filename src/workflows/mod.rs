//! Request workflows built on the relay.
//!
//! - [`chat`]: Plain streamed answer under a system prompt
//! - [`suggestions`]: Answer followed by a streamed list of follow-up questions
//! - [`slack`]: Draft, feedback and final Slack message as separate channels
//! - [`research`]: Plan and queries, concurrent search, cited summary
//! - [`router`]: Classifier picks the model that answers

pub mod chat;
pub mod research;
pub mod router;
pub mod slack;
pub mod suggestions;

use crate::producer::{
    text_ui_stream, LanguageModel, ModelRequest, SharedModel, TextStream, UiStreamOptions,
};
use crate::relay::{MergeOptions, RelayError, RelaySession};

pub use chat::Chat;
pub use research::{Research, ResearchPlan};
pub use router::{ModelChoice, ModelRouter};
pub use slack::SlackMessage;
pub use suggestions::Suggestions;

/// The two model tiers available to workflows.
#[derive(Clone)]
pub struct Models {
    pub basic: SharedModel,
    pub advanced: SharedModel,
}

impl Models {
    pub fn new(basic: SharedModel, advanced: SharedModel) -> Self {
        Self { basic, advanced }
    }

    pub fn get(&self, choice: ModelChoice) -> &SharedModel {
        match choice {
            ModelChoice::Basic => &self.basic,
            ModelChoice::Advanced => &self.advanced,
        }
    }
}

/// Stream `request` through `model` as a foreign part stream with ids from
/// the session.
pub(crate) fn answer_stream(
    session: &RelaySession,
    model: &dyn LanguageModel,
    request: ModelRequest,
    options: UiStreamOptions,
) -> TextStream {
    text_ui_stream(model.stream_text(request), session.ids().clone(), options)
}

/// Merge an answer and wait until it has been forwarded in full.
pub(crate) async fn merge_answer(
    session: &mut RelaySession,
    answer: TextStream,
    options: MergeOptions,
) -> Result<String, RelayError> {
    let TextStream { parts, text } = answer;
    session.merge(parts, options);

    match text.wait().await {
        Ok(text) => Ok(text),
        Err(_) if session.is_disconnected() => Err(RelayError::Disconnected),
        Err(e) => {
            // The forwarder is about to write the producer's error part.
            session.drain_merges().await;
            Err(e.into())
        }
    }
}
