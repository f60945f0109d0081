//! Research workflow.
//!
//! 1. Stream a `{ plan, queries }` object, relaying `plan` on a text channel
//!    and `queries` on a list channel as they fill in.
//! 2. Run every query through the search provider concurrently.
//! 3. Emit one `search-results` part per query, in the order the queries
//!    were issued.
//! 4. Merge the summary answer, which sees the search results. The session
//!    already wrote its start marker, so the summary's is suppressed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::producer::messages::to_model_messages;
use crate::producer::{
    search_all, stream_object, ModelRequest, ProducerError, QueryResults, SharedModel, SharedSearch,
    UiMessage, UiStreamOptions,
};
use crate::relay::channel::{FieldKind, ObjectRelay};
use crate::relay::{MergeOptions, RelayError, RelaySession, Workflow};
use crate::workflows::{answer_stream, merge_answer};

const PLAN_SYSTEM: &str = "You are a helpful assistant that generates queries to search the web for information.
<rules>
  Make a plan before you generate the queries. The plan should identify the groups of information required to answer the question.
  The plan should list pieces of information that are required to answer the question, then consider how to break down the information into queries.
</rules>
Generate 3-5 queries that are relevant to the conversation history.
<output-format>
  Reply as a JSON object with the following properties:
  - plan: A string describing the plan for the queries.
  - queries: An array of strings, each representing a query.
</output-format>";

const SUMMARY_SYSTEM: &str = "You are a helpful assistant that generates a final response to the user.
<rules>
  You should use the search results to answer the question.
  Use sources from the search results to answer the question.
  Sources should be cited as markdown links.
</rules>
<output-format>
  Use markdown formatting.
</output-format>";

/// Final value of the planning object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub plan: String,
    pub queries: Vec<String>,
}

fn plan_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "plan": { "type": "string" },
            "queries": { "type": "array", "items": { "type": "string" } }
        },
        "required": ["plan", "queries"]
    })
}

fn render_results(results: &[QueryResults]) -> String {
    let mut out = String::from("<search-results>\n");
    for result in results {
        out.push_str(&format!("<query>{}</query>\n", result.query));
        for hit in &result.hits {
            out.push_str(&format!("- [{}]({}): {}\n", hit.title, hit.url, hit.content));
        }
    }
    out.push_str("</search-results>");
    out
}

pub struct Research {
    pub model: SharedModel,
    pub search: SharedSearch,
    pub max_results: usize,
    pub messages: Vec<UiMessage>,
}

#[async_trait]
impl Workflow for Research {
    fn name(&self) -> &'static str {
        "research"
    }

    async fn execute(self, session: &mut RelaySession) -> Result<(), RelayError> {
        let history = to_model_messages(&self.messages);

        session.start(None).await?;

        let plan_channel = session.open("plan");
        let queries_channel = session.open("queries");
        let request = ModelRequest::new(history.clone())
            .with_system(PLAN_SYSTEM)
            .with_schema(plan_schema());
        let object = ObjectRelay::new(session)
            .field("plan", FieldKind::Text, &plan_channel)
            .field("queries", FieldKind::StringList, &queries_channel)
            .run(stream_object(self.model.as_ref(), request))
            .await?;

        let plan: ResearchPlan = serde_json::from_value(object)
            .map_err(|e| ProducerError::Malformed(format!("research plan: {e}")))?;
        info!(queries = plan.queries.len(), "Research plan ready");

        let results = search_all(self.search.as_ref(), &plan.queries, self.max_results).await?;
        for result in &results {
            let channel = session.open("search-results");
            session.emit(&channel, result).await?;
        }
        debug!(hits = results.iter().map(|r| r.hits.len()).sum::<usize>(), "Search results relayed");

        let system = format!("{SUMMARY_SYSTEM}\n\n{}", render_results(&results));
        let summary = ModelRequest::new(history).with_system(system);
        let answer = answer_stream(session, self.model.as_ref(), summary, UiStreamOptions::default());
        merge_answer(session, answer, MergeOptions::without_start()).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::SearchHit;

    #[test]
    fn test_results_render_as_markdown_links() {
        let results = vec![QueryResults {
            query: "rust async".into(),
            hits: vec![SearchHit {
                title: "Tokio".into(),
                url: "https://tokio.rs".into(),
                content: "Runtime".into(),
            }],
        }];
        let rendered = render_results(&results);
        assert!(rendered.contains("<query>rust async</query>"));
        assert!(rendered.contains("- [Tokio](https://tokio.rs): Runtime"));
    }
}
