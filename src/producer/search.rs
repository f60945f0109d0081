//! Web search seam and ordered fan-out.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::producer::ProducerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Hits for one issued query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProducerError>;
}

pub type SharedSearch = Arc<dyn SearchProvider>;

/// Run every query concurrently and wait for all of them.
///
/// Results come back in the order the queries were issued, whatever order
/// the searches complete in. Any failing query fails the whole batch.
pub async fn search_all(
    provider: &dyn SearchProvider,
    queries: &[String],
    max_results: usize,
) -> Result<Vec<QueryResults>, ProducerError> {
    let searches = queries.iter().map(|query| async move {
        let hits = provider.search(query, max_results).await?;
        debug!(query = query.as_str(), hits = hits.len(), "Search complete");
        Ok::<_, ProducerError>(QueryResults {
            query: query.clone(),
            hits,
        })
    });

    try_join_all(searches).await
}

/// Synthetic search results with per-query latency and failure injection.
#[derive(Default)]
pub struct StubSearch {
    default_delay: Option<Duration>,
    delays: HashMap<String, Duration>,
    failing: HashSet<String>,
    completed: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn with_delay(mut self, query: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    pub fn failing_on(mut self, query: impl Into<String>) -> Self {
        self.failing.insert(query.into());
        self
    }

    /// Queries in the order their searches completed.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ProducerError> {
        if let Some(delay) = self.delays.get(query).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }

        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());

        if self.failing.contains(query) {
            return Err(ProducerError::Upstream(format!("search failed for {query:?}")));
        }

        let slug: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();

        Ok((1..=max_results.min(3))
            .map(|i| SearchHit {
                title: format!("{query}: result {i}"),
                url: format!("https://search.example/{slug}/{i}"),
                content: format!("Summary {i} for {query}."),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_results_follow_issue_order() {
        let search = StubSearch::new()
            .with_delay("slow", Duration::from_millis(40))
            .with_delay("fast", Duration::from_millis(1));
        let queries = vec!["slow".to_string(), "fast".to_string()];

        let results = search_all(&search, &queries, 5).await.unwrap();

        let order: Vec<&str> = results.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(order, vec!["slow", "fast"]);
        assert_eq!(search.completion_order(), vec!["fast", "slow"]);
        assert_eq!(results[0].hits.len(), 3);
    }

    #[tokio::test]
    async fn test_any_failure_fails_batch() {
        let search = StubSearch::new().failing_on("bad");
        let queries = vec!["good".to_string(), "bad".to_string()];
        assert!(search_all(&search, &queries, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_max_results_caps_hits() {
        let hits = StubSearch::new().search("rust async", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://search.example/rust-async/1");
    }
}
