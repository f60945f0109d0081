//! Reader-side view of an output stream.
//!
//! Applies parts as a log: the latest data part per channel wins, text
//! deltas are concatenated per text block.

use std::collections::HashMap;

use serde_json::Value;

use crate::relay::part::Part;

#[derive(Debug, Default, Clone)]
pub struct PartLog {
    /// Channel ids in first-seen order, with their tag.
    channels: Vec<(String, String)>,
    latest: HashMap<String, Value>,
    text_blocks: Vec<(String, String)>,
    updates: HashMap<String, usize>,
    metadata: Option<Value>,
    starts: usize,
    finished: bool,
    error: Option<String>,
}

impl PartLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts<'a>(parts: impl IntoIterator<Item = &'a Part>) -> Self {
        let mut log = Self::new();
        for part in parts {
            log.apply(part);
        }
        log
    }

    pub fn apply(&mut self, part: &Part) {
        match part {
            Part::Start { metadata, .. } => {
                self.starts += 1;
                if metadata.is_some() {
                    self.metadata = metadata.clone();
                }
            }
            Part::TextStart { id } => self.text_blocks.push((id.clone(), String::new())),
            Part::TextDelta { id, delta } => {
                match self.text_blocks.iter_mut().find(|(block, _)| block == id) {
                    Some((_, text)) => text.push_str(delta),
                    // Delta without a preceding text-start.
                    None => self.text_blocks.push((id.clone(), delta.clone())),
                }
            }
            Part::TextEnd { .. } => {}
            Part::Data { tag, id, data } => {
                if !self.latest.contains_key(id) {
                    self.channels.push((id.clone(), tag.clone()));
                }
                self.latest.insert(id.clone(), data.clone());
                *self.updates.entry(id.clone()).or_default() += 1;
            }
            Part::Error { error_text } => self.error = Some(error_text.clone()),
            Part::Finish => self.finished = true,
        }
    }

    /// Current value of a channel.
    pub fn value(&self, id: &str) -> Option<&Value> {
        self.latest.get(id)
    }

    /// Number of parts received for a channel.
    pub fn updates(&self, id: &str) -> usize {
        self.updates.get(id).copied().unwrap_or(0)
    }

    /// Current values of every channel with `tag`, in first-seen order.
    pub fn values_for_tag(&self, tag: &str) -> Vec<&Value> {
        self.channels
            .iter()
            .filter(|(_, t)| t == tag)
            .filter_map(|(id, _)| self.latest.get(id))
            .collect()
    }

    /// All text blocks concatenated in order.
    pub fn text(&self) -> String {
        self.text_blocks.iter().map(|(_, t)| t.as_str()).collect()
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn start_count(&self) -> usize {
        self.starts
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_latest_data_part_wins() {
        let parts = vec![
            Part::Data {
                tag: "data-plan".into(),
                id: "p".into(),
                data: json!("a"),
            },
            Part::Data {
                tag: "data-plan".into(),
                id: "p".into(),
                data: json!("ab"),
            },
            Part::TextStart { id: "t".into() },
            Part::TextDelta {
                id: "t".into(),
                delta: "Hel".into(),
            },
            Part::TextDelta {
                id: "t".into(),
                delta: "lo".into(),
            },
            Part::Finish,
        ];
        let log = PartLog::from_parts(&parts);

        assert_eq!(log.value("p"), Some(&json!("ab")));
        assert_eq!(log.updates("p"), 2);
        assert_eq!(log.values_for_tag("data-plan"), vec![&json!("ab")]);
        assert_eq!(log.text(), "Hello");
        assert!(log.is_finished());
        assert!(log.error().is_none());
    }
}
