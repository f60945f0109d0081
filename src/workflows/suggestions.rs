//! Answer plus follow-up suggestions.
//!
//! The answer is merged with its finish marker suppressed so the session can
//! keep writing; the suggestions are then streamed as a structured object
//! and relayed on a `suggestions` channel, one snapshot per change.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::producer::messages::to_model_messages;
use crate::producer::{stream_object, ModelMessage, ModelRequest, SharedModel, UiMessage, UiStreamOptions};
use crate::relay::channel::{materialized_strings, FieldKind, ObjectRelay};
use crate::relay::{MergeOptions, RelayError, RelaySession, Workflow};
use crate::workflows::{answer_stream, merge_answer};

const SUGGESTIONS_PROMPT: &str =
    "What question should I ask next? Return an array of suggested questions.";

pub struct Suggestions {
    pub model: SharedModel,
    pub messages: Vec<UiMessage>,
}

fn suggestions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "suggestions": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["suggestions"]
    })
}

#[async_trait]
impl Workflow for Suggestions {
    fn name(&self) -> &'static str {
        "suggestions"
    }

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError> {
        let history = to_model_messages(&self.messages);

        let answer = answer_stream(
            session,
            self.model.as_ref(),
            ModelRequest::new(history.clone()),
            UiStreamOptions::default(),
        );
        let text = merge_answer(session, answer, MergeOptions::without_finish()).await?;

        let mut followup = history;
        followup.push(ModelMessage::assistant(text));
        followup.push(ModelMessage::user(SUGGESTIONS_PROMPT));
        let request = ModelRequest::new(followup).with_schema(suggestions_schema());

        let channel = session.open("suggestions");
        let object = ObjectRelay::new(session)
            .field("suggestions", FieldKind::StringList, &channel)
            .run(stream_object(self.model.as_ref(), request))
            .await?;

        let count = object
            .get("suggestions")
            .map(|s| materialized_strings(s).len())
            .unwrap_or(0);
        tracing::debug!(count, "Suggestions streamed");
        Ok(())
    }
}
