//! Accumulation of producer fragments onto channels.
//!
//! Payloads are always full snapshots: a text channel carries the whole text
//! so far, a list channel the whole list with entries that are not yet
//! materialized removed. A reader that keeps only the latest part per
//! channel therefore always holds the current value.

use futures::{pin_mut, Stream, StreamExt};
use serde_json::Value;

use crate::producer::ProducerError;
use crate::relay::ids::ChannelId;
use crate::relay::session::RelaySession;
use crate::relay::RelayError;

/// Text accumulated from deltas.
#[derive(Debug, Default, Clone)]
pub struct TextAccumulator {
    text: String,
}

impl TextAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a delta and return the full text so far.
    pub fn push(&mut self, delta: &str) -> &str {
        self.text.push_str(delta);
        &self.text
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// Entries of a partial list snapshot that have materialized.
///
/// Non-array values yield an empty list.
pub fn materialized_items(snapshot: &Value) -> Vec<Value> {
    snapshot
        .as_array()
        .map(|items| items.iter().filter(|v| !v.is_null()).cloned().collect())
        .unwrap_or_default()
}

/// String entries of a partial list snapshot.
pub fn materialized_strings(snapshot: &Value) -> Vec<String> {
    snapshot
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Emit the accumulated text after every delta. Returns the final text.
pub async fn relay_text<S>(
    session: &RelaySession,
    channel: &ChannelId,
    deltas: S,
) -> Result<String, RelayError>
where
    S: Stream<Item = Result<String, ProducerError>>,
{
    pin_mut!(deltas);
    let mut text = TextAccumulator::new();

    while let Some(delta) = deltas.next().await {
        let delta = delta?;
        session.emit(channel, text.push(&delta)).await?;
    }

    Ok(text.into_string())
}

/// Emit the materialized entries of every list snapshot. Returns the last list.
pub async fn relay_list<S>(
    session: &RelaySession,
    channel: &ChannelId,
    snapshots: S,
) -> Result<Vec<Value>, RelayError>
where
    S: Stream<Item = Result<Value, ProducerError>>,
{
    pin_mut!(snapshots);
    let mut current = Vec::new();

    while let Some(snapshot) = snapshots.next().await {
        current = materialized_items(&snapshot?);
        session.emit(channel, &current).await?;
    }

    Ok(current)
}

/// How a field of a partial object is projected onto its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-empty string snapshots.
    Text,
    /// Array snapshots with `null` entries removed.
    List,
    /// Array snapshots keeping only string entries.
    StringList,
}

struct Field {
    name: String,
    kind: FieldKind,
    channel: ChannelId,
    last: Option<Value>,
}

/// Routes fields of partial-object snapshots to their own channels.
pub struct ObjectRelay<'s> {
    session: &'s RelaySession,
    fields: Vec<Field>,
}

impl<'s> ObjectRelay<'s> {
    pub fn new(session: &'s RelaySession) -> Self {
        Self {
            session,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, channel: &ChannelId) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            channel: channel.clone(),
            last: None,
        });
        self
    }

    /// Consume the snapshots, emitting a field's projection whenever it
    /// changes. Returns the last snapshot (`Null` if there was none).
    pub async fn run<S>(mut self, snapshots: S) -> Result<Value, RelayError>
    where
        S: Stream<Item = Result<Value, ProducerError>>,
    {
        pin_mut!(snapshots);
        let mut latest = Value::Null;

        while let Some(snapshot) = snapshots.next().await {
            latest = snapshot?;

            for field in &mut self.fields {
                let Some(raw) = latest.get(&field.name) else {
                    continue;
                };
                let projected = match field.kind {
                    FieldKind::Text => match raw.as_str() {
                        Some(s) if !s.is_empty() => Value::String(s.to_string()),
                        _ => continue,
                    },
                    FieldKind::List if raw.is_array() => Value::Array(materialized_items(raw)),
                    FieldKind::StringList if raw.is_array() => materialized_strings(raw).into(),
                    FieldKind::List | FieldKind::StringList => continue,
                };

                if field.last.as_ref() == Some(&projected) {
                    continue;
                }
                self.session.emit(&field.channel, &projected).await?;
                field.last = Some(projected);
            }
        }

        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_accumulator_returns_full_text() {
        let mut acc = TextAccumulator::new();
        assert_eq!(acc.push("Hi"), "Hi");
        assert_eq!(acc.push(" there"), "Hi there");
        assert_eq!(acc.into_string(), "Hi there");
    }

    #[test]
    fn test_materialized_items_drops_nulls() {
        assert_eq!(materialized_items(&json!([null, "a"])), vec![json!("a")]);
        assert_eq!(materialized_items(&json!({ "a": 1 })), Vec::<Value>::new());
    }

    #[test]
    fn test_materialized_strings_drops_non_strings() {
        assert_eq!(materialized_strings(&json!(["a", null, 3, "b"])), vec!["a", "b"]);
    }
}
