//! Model routing: a cheap classification call decides which tier answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::producer::messages::to_model_messages;
use crate::producer::{ModelRequest, UiMessage, UiStreamOptions};
use crate::relay::{MergeOptions, RelayError, RelaySession, Workflow};
use crate::workflows::{answer_stream, merge_answer, Models};

const ROUTER_SYSTEM: &str = "You are a model router. Your job is to figure out whether to use an advanced model or a basic model.
<rules>
  - If the question is about something trivial, use the basic model.
  - If the question involves any kind of counting or math, use the advanced model.
</rules>
<output-format>
  Return a single number: 0 or 1.
  Return 0 to choose the basic model.
  Return 1 to choose the advanced model.
</output-format>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    Basic,
    Advanced,
}

impl ModelChoice {
    /// Interpret the router's answer. Anything but `1` picks the basic model.
    pub fn from_verdict(verdict: &str) -> Self {
        if verdict.trim() == "1" {
            ModelChoice::Advanced
        } else {
            ModelChoice::Basic
        }
    }
}

pub struct ModelRouter {
    pub models: Models,
    pub messages: Vec<UiMessage>,
}

#[async_trait]
impl Workflow for ModelRouter {
    fn name(&self) -> &'static str {
        "model-router"
    }

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError> {
        let history = to_model_messages(&self.messages);

        let started = std::time::Instant::now();
        let verdict = self
            .models
            .basic
            .generate_text(ModelRequest::new(history.clone()).with_system(ROUTER_SYSTEM))
            .await?;
        let choice = ModelChoice::from_verdict(&verdict);
        info!(
            verdict = verdict.trim(),
            ?choice,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model selected"
        );

        let options = UiStreamOptions {
            message_metadata: Some(json!({ "model": choice })),
            ..UiStreamOptions::default()
        };
        let model = self.models.get(choice);
        let answer = answer_stream(session, model.as_ref(), ModelRequest::new(history), options);
        merge_answer(session, answer, MergeOptions::default()).await?;

        Ok(())
    }
}
