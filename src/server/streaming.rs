//! SSE (Server-Sent Events) transport for relay sessions.
//!
//! Each part becomes one `data:` event carrying its JSON encoding. A
//! `[DONE]` sentinel follows the last part.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::Stream;
use tokio::sync::OwnedSemaphorePermit;
use tokio_stream::StreamExt;

use crate::metrics::RelayMetrics;
use crate::relay::{Part, PartStream};

/// Response header announcing the UI message stream protocol.
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_MESSAGE_STREAM_VERSION: &str = "v1";

pub const DONE_SENTINEL: &str = "[DONE]";

/// JSON payload of one SSE event.
pub fn encode_part(part: &Part) -> String {
    serde_json::to_string(part).unwrap_or_default()
}

/// Convert a session's output stream into an SSE event stream.
///
/// `permit`, if given, is released only when the event stream is dropped.
pub fn parts_to_sse_stream(
    parts: PartStream,
    metrics: Option<Arc<RelayMetrics>>,
    permit: Option<OwnedSemaphorePermit>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    parts
        .map(move |part| {
            let _slot = &permit;
            if let Some(m) = &metrics {
                m.part_sent();
            }
            Ok(Event::default().data(encode_part(&part)))
        })
        // Append the [DONE] sentinel after all parts.
        .chain(tokio_stream::once(Ok(Event::default().data(DONE_SENTINEL))))
}

/// Full SSE response for a session: protocol header, events, keep-alives.
pub fn sse_response(
    parts: PartStream,
    metrics: Option<Arc<RelayMetrics>>,
    permit: Option<OwnedSemaphorePermit>,
    keep_alive: Duration,
) -> impl IntoResponse {
    let stream = parts_to_sse_stream(parts, metrics, permit);
    (
        [(
            HeaderName::from_static(UI_MESSAGE_STREAM_HEADER),
            UI_MESSAGE_STREAM_VERSION,
        )],
        Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive)),
    )
}
