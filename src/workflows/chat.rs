use async_trait::async_trait;
use tracing::debug;

use crate::producer::messages::to_model_messages;
use crate::producer::{ModelRequest, SharedModel, UiMessage, UiStreamOptions};
use crate::relay::{MergeOptions, RelayError, RelaySession, Workflow};
use crate::workflows::{answer_stream, merge_answer};

const SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Reply in a friendly and engaging tone, and keep answers short.";

/// Streams the model's answer to the conversation.
pub struct Chat {
    pub model: SharedModel,
    pub messages: Vec<UiMessage>,
}

#[async_trait]
impl Workflow for Chat {
    fn name(&self) -> &'static str {
        "chat"
    }

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError> {
        let request = ModelRequest::new(to_model_messages(&self.messages)).with_system(SYSTEM_PROMPT);
        let answer = answer_stream(session, self.model.as_ref(), request, UiStreamOptions::default());

        let text = merge_answer(session, answer, MergeOptions::default()).await?;
        debug!(chars = text.len(), model = self.model.id(), "Answer streamed");
        Ok(())
    }
}
