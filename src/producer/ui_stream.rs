//! Conversion of a text delta stream into a foreign part stream.
//!
//! The resulting stream is what a session merges wholesale: an optional
//! start marker, one text block (`text-start`, deltas, `text-end`) and an
//! optional finish marker. A failing producer ends the stream with an error
//! part instead.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::producer::{ProducerError, TextDeltaStream};
use crate::relay::ids::SharedIds;
use crate::relay::part::Part;

/// Markers and metadata written around the text block.
#[derive(Debug, Clone)]
pub struct UiStreamOptions {
    pub send_start: bool,
    pub send_finish: bool,
    /// Attached to the start marker as `messageMetadata`.
    pub message_metadata: Option<Value>,
}

impl Default for UiStreamOptions {
    fn default() -> Self {
        Self {
            send_start: true,
            send_finish: true,
            message_metadata: None,
        }
    }
}

/// A foreign part stream plus the final text it resolves to.
pub struct TextStream {
    pub parts: BoxStream<'static, Part>,
    pub text: FinalText,
}

/// Resolves once the part stream has yielded its last part.
pub struct FinalText(oneshot::Receiver<Result<String, ProducerError>>);

impl FinalText {
    /// Wait for the complete text. Fails if the producer failed or the part
    /// stream was dropped before it finished.
    pub async fn wait(self) -> Result<String, ProducerError> {
        self.0.await.unwrap_or(Err(ProducerError::Cancelled))
    }
}

enum Phase {
    Begin,
    Streaming,
    Resolve,
    Done,
}

struct State {
    deltas: TextDeltaStream,
    phase: Phase,
    message_id: String,
    text_id: String,
    text: String,
    options: UiStreamOptions,
    tx: Option<oneshot::Sender<Result<String, ProducerError>>>,
}

impl State {
    fn resolve(&mut self, result: Result<String, ProducerError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

/// Wrap `deltas` as a part stream with ids drawn from `ids`.
pub fn text_ui_stream(deltas: TextDeltaStream, ids: SharedIds, options: UiStreamOptions) -> TextStream {
    let (tx, rx) = oneshot::channel();
    let state = State {
        deltas,
        phase: Phase::Begin,
        message_id: ids.next_id(),
        text_id: ids.next_id(),
        text: String::new(),
        options,
        tx: Some(tx),
    };

    let parts = stream::unfold(state, |mut st| async move {
        let batch = match st.phase {
            Phase::Begin => {
                st.phase = Phase::Streaming;
                let mut batch = Vec::with_capacity(2);
                if st.options.send_start {
                    batch.push(Part::Start {
                        message_id: Some(st.message_id.clone()),
                        metadata: st.options.message_metadata.take(),
                    });
                }
                batch.push(Part::TextStart {
                    id: st.text_id.clone(),
                });
                batch
            }
            Phase::Streaming => match st.deltas.next().await {
                Some(Ok(delta)) if delta.is_empty() => Vec::new(),
                Some(Ok(delta)) => {
                    st.text.push_str(&delta);
                    vec![Part::TextDelta {
                        id: st.text_id.clone(),
                        delta,
                    }]
                }
                Some(Err(e)) => {
                    st.phase = Phase::Done;
                    let error_text = e.to_string();
                    st.resolve(Err(e));
                    vec![Part::Error { error_text }]
                }
                None => {
                    st.phase = Phase::Resolve;
                    let mut batch = vec![Part::TextEnd {
                        id: st.text_id.clone(),
                    }];
                    if st.options.send_finish {
                        batch.push(Part::Finish);
                    }
                    batch
                }
            },
            Phase::Resolve => {
                st.phase = Phase::Done;
                let text = std::mem::take(&mut st.text);
                st.resolve(Ok(text));
                return None;
            }
            Phase::Done => return None,
        };
        Some((batch, st))
    })
    .flat_map(stream::iter)
    .boxed();

    TextStream {
        parts,
        text: FinalText(rx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::ids::SequentialIds;

    fn deltas(items: Vec<Result<&str, ProducerError>>) -> TextDeltaStream {
        let items: Vec<_> = items.into_iter().map(|r| r.map(str::to_string)).collect();
        stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_text_block_framing() {
        let TextStream { parts, text } = text_ui_stream(
            deltas(vec![Ok("Hel"), Ok(""), Ok("lo")]),
            SequentialIds::shared("x"),
            UiStreamOptions::default(),
        );
        let parts: Vec<Part> = parts.collect().await;

        assert_eq!(
            parts,
            vec![
                Part::Start {
                    message_id: Some("x-1".into()),
                    metadata: None
                },
                Part::TextStart { id: "x-2".into() },
                Part::TextDelta {
                    id: "x-2".into(),
                    delta: "Hel".into()
                },
                Part::TextDelta {
                    id: "x-2".into(),
                    delta: "lo".into()
                },
                Part::TextEnd { id: "x-2".into() },
                Part::Finish,
            ]
        );
        assert_eq!(text.wait().await.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_markers_can_be_omitted() {
        let options = UiStreamOptions {
            send_start: false,
            send_finish: false,
            message_metadata: None,
        };
        let stream = text_ui_stream(deltas(vec![Ok("a")]), SequentialIds::shared("x"), options);
        let parts: Vec<Part> = stream.parts.collect().await;
        assert!(!parts.iter().any(|p| p.is_start() || p.is_finish()));
        assert_eq!(parts.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_ends_with_error_part() {
        let stream = text_ui_stream(
            deltas(vec![Ok("a"), Err(ProducerError::Upstream("down".into())), Ok("never")]),
            SequentialIds::shared("x"),
            UiStreamOptions::default(),
        );
        let parts: Vec<Part> = stream.parts.collect().await;
        assert!(parts.last().unwrap().is_error());
        assert_eq!(parts.len(), 4);
        assert_eq!(
            stream.text.wait().await,
            Err(ProducerError::Upstream("down".into()))
        );
    }

    #[tokio::test]
    async fn test_dropped_stream_cancels_text() {
        let stream = text_ui_stream(deltas(vec![Ok("a")]), SequentialIds::shared("x"), UiStreamOptions::default());
        drop(stream.parts);
        assert_eq!(stream.text.wait().await, Err(ProducerError::Cancelled));
    }
}
