//! Forwarding a foreign part stream into a session's output stream.

use futures::{pin_mut, Stream, StreamExt};
use tracing::debug;

use crate::relay::part::Part;
use crate::relay::session::Outbox;

/// Which protocol markers of a merged stream are forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Forward the foreign stream's start marker.
    pub send_start: bool,
    /// Forward the foreign stream's finish marker.
    pub send_finish: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            send_start: true,
            send_finish: true,
        }
    }
}

impl MergeOptions {
    /// For sessions that already wrote their own start marker.
    pub fn without_start() -> Self {
        Self {
            send_start: false,
            ..Self::default()
        }
    }

    /// For streams followed by more output from the session itself.
    pub fn without_finish() -> Self {
        Self {
            send_finish: false,
            ..Self::default()
        }
    }
}

/// Forward parts verbatim until the foreign stream ends, an error part has
/// been forwarded, or the reader goes away. Returns the number forwarded.
pub(crate) async fn forward<S>(foreign: S, outbox: Outbox, options: MergeOptions) -> usize
where
    S: Stream<Item = Part> + Send,
{
    pin_mut!(foreign);
    let mut forwarded = 0;

    while let Some(part) = foreign.next().await {
        if part.is_start() && !options.send_start {
            debug!("Suppressing merged start marker");
            continue;
        }
        if part.is_finish() && !options.send_finish {
            continue;
        }
        if part.is_start() && outbox.started() {
            debug!("Merged stream carries a second start marker");
        }

        let terminal = part.is_error();
        if outbox.send(part).await.is_err() {
            debug!(forwarded, "Reader gone; dropping merged stream");
            break;
        }
        forwarded += 1;

        if terminal {
            break;
        }
    }

    forwarded
}
