//! Slack message writer: draft, critique, final attempt.

use async_trait::async_trait;
use tracing::debug;

use crate::producer::messages::format_history;
use crate::producer::{ModelRequest, SharedModel, UiMessage, UiStreamOptions};
use crate::relay::channel::relay_text;
use crate::relay::{MergeOptions, RelayError, RelaySession, Workflow};
use crate::workflows::{answer_stream, merge_answer};

const FIRST_DRAFT_SYSTEM: &str = "You are writing a Slack message for a user based on the \
conversation history. Only return the Slack message, no other text.";

const EVALUATE_SYSTEM: &str = "You are evaluating the Slack message produced by the user.

Evaluation criteria:
- The Slack message should be written in a way that is easy to understand.
- It should be appropriate for a professional Slack conversation.";

const FINAL_SYSTEM: &str = "You are writing a Slack message based on the conversation history, \
a first draft, and some feedback given about that draft.

Return only the final Slack message, no other text.";

pub struct SlackMessage {
    pub model: SharedModel,
    pub messages: Vec<UiMessage>,
}

#[async_trait]
impl Workflow for SlackMessage {
    fn name(&self) -> &'static str {
        "slack-message"
    }

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError> {
        let history = format_history(&self.messages);
        let model = self.model.as_ref();

        session.start(None).await?;

        let draft_channel = session.open("slack-message");
        let draft_request = ModelRequest::from_prompt(format!("Conversation history:\n{history}"))
            .with_system(FIRST_DRAFT_SYSTEM);
        let draft = relay_text(session, &draft_channel, model.stream_text(draft_request)).await?;
        debug!(chars = draft.len(), "First draft written");

        let feedback_channel = session.open("slack-message-feedback");
        let feedback_request = ModelRequest::from_prompt(format!(
            "Conversation history:\n{history}\n\nSlack message:\n{draft}"
        ))
        .with_system(EVALUATE_SYSTEM);
        let feedback = relay_text(session, &feedback_channel, model.stream_text(feedback_request)).await?;

        let final_request = ModelRequest::from_prompt(format!(
            "Conversation history:\n{history}\n\nFirst draft:\n{draft}\n\nPrevious feedback:\n{feedback}"
        ))
        .with_system(FINAL_SYSTEM);
        let answer = answer_stream(session, model, final_request, UiStreamOptions::default());
        merge_answer(session, answer, MergeOptions::without_start()).await?;

        Ok(())
    }
}
