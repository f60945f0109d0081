//! Relay session: owns the channels and the output stream of one request.
//!
//! The output stream is a bounded mpsc channel. The session is the only
//! writer apart from merge forwarders, which hold clones of the same sender
//! and are drained before the stream is finished.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::relay::ids::{ChannelId, SharedIds};
use crate::relay::merge::{self, MergeOptions};
use crate::relay::part::{data_tag, Part};
use crate::relay::RelayError;

/// Reader half of a session's output stream.
pub type PartStream = ReceiverStream<Part>;

#[derive(Debug, Default)]
struct OutboxState {
    started: AtomicBool,
    finished: AtomicBool,
    failed: AtomicBool,
    parts: AtomicU64,
}

/// Write handle onto the output stream, shared with merge forwarders.
#[derive(Debug, Clone)]
pub(crate) struct Outbox {
    tx: mpsc::Sender<Part>,
    state: Arc<OutboxState>,
}

impl Outbox {
    /// Append one part, waiting for buffer space.
    pub(crate) async fn send(&self, part: Part) -> Result<(), RelayError> {
        let flag = match &part {
            Part::Start { .. } => Some(&self.state.started),
            Part::Finish => Some(&self.state.finished),
            Part::Error { .. } => Some(&self.state.failed),
            _ => None,
        };

        self.tx.send(part).await.map_err(|_| RelayError::Disconnected)?;

        if let Some(flag) = flag {
            flag.store(true, Ordering::Release);
        }
        self.state.parts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub(crate) fn started(&self) -> bool {
        self.state.started.load(Ordering::Acquire)
    }

    fn finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    fn failed(&self) -> bool {
        self.state.failed.load(Ordering::Acquire)
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub parts: u64,
    pub channels: usize,
    pub elapsed: Duration,
}

/// A single request/response relay session.
pub struct RelaySession {
    outbox: Outbox,

    /// Open channels and their type tags.
    channels: HashMap<ChannelId, String>,

    /// Channels closed explicitly; never reopened.
    retired: HashSet<ChannelId>,

    ids: SharedIds,

    /// In-flight merge forwarders.
    merges: Vec<JoinHandle<usize>>,

    opened_at: Instant,
}

impl RelaySession {
    /// Create a session and the stream its parts are written to.
    pub fn new(buffer_size: usize, ids: SharedIds) -> (Self, PartStream) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        let session = Self {
            outbox: Outbox {
                tx,
                state: Arc::default(),
            },
            channels: HashMap::new(),
            retired: HashSet::new(),
            ids,
            merges: Vec::new(),
            opened_at: Instant::now(),
        };
        (session, ReceiverStream::new(rx))
    }

    /// Identifier generator shared by everything this session creates.
    pub fn ids(&self) -> &SharedIds {
        &self.ids
    }

    /// Whether a start marker has been written, directly or by a merge.
    pub fn started(&self) -> bool {
        self.outbox.started()
    }

    /// Whether the reader of the output stream has gone away.
    pub fn is_disconnected(&self) -> bool {
        self.outbox.tx.is_closed()
    }

    /// Write the session-start marker.
    pub async fn start(&mut self, metadata: Option<Value>) -> Result<(), RelayError> {
        if self.outbox.started() {
            warn!("Start marker already written; writing another");
        }
        let message_id = self.ids.next_id();
        self.outbox
            .send(Part::Start {
                message_id: Some(message_id),
                metadata,
            })
            .await
    }

    /// Register a new channel with the given type tag and return its id.
    pub fn open(&mut self, tag: &str) -> ChannelId {
        let tag = data_tag(tag);
        loop {
            let id = ChannelId::new(self.ids.next_id());
            if self.channels.contains_key(&id) || self.retired.contains(&id) {
                warn!(channel = %id, "Identifier generator repeated an id; drawing another");
                continue;
            }
            debug!(channel = %id, tag = tag, "Channel opened");
            self.channels.insert(id.clone(), tag);
            return id;
        }
    }

    /// Retire a channel. Further emits on it fail.
    pub fn close_channel(&mut self, id: &ChannelId) -> Result<(), RelayError> {
        if self.channels.remove(id).is_none() {
            return Err(RelayError::UnknownChannel(id.clone()));
        }
        self.retired.insert(id.clone());
        Ok(())
    }

    /// Append one data part carrying `payload` for an open channel.
    pub async fn emit<T>(&self, id: &ChannelId, payload: T) -> Result<(), RelayError>
    where
        T: Serialize,
    {
        let tag = self
            .channels
            .get(id)
            .ok_or_else(|| RelayError::UnknownChannel(id.clone()))?;
        let data = serde_json::to_value(payload)?;

        self.outbox
            .send(Part::Data {
                tag: tag.clone(),
                id: id.as_str().to_string(),
                data,
            })
            .await
    }

    /// Forward every part of `foreign` onto this session's stream.
    ///
    /// Returns immediately; forwarding runs on its own task and is drained
    /// by [`close`](Self::close).
    pub fn merge<S>(&mut self, foreign: S, options: MergeOptions)
    where
        S: Stream<Item = Part> + Send + 'static,
    {
        let outbox = self.outbox.clone();
        self.merges
            .push(tokio::spawn(merge::forward(foreign, outbox, options)));
    }

    /// Wait for every scheduled merge to finish forwarding.
    ///
    /// Cancel-safe: a handle stays registered until its forwarder has
    /// finished, so an interrupted drain can still be aborted by
    /// [`fail`](Self::fail) or [`abandon`](Self::abandon).
    pub async fn drain_merges(&mut self) {
        while let Some(handle) = self.merges.first_mut() {
            let result = handle.await;
            self.merges.remove(0);
            match result {
                Ok(forwarded) => debug!(forwarded, "Merge drained"),
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("Merge forwarder panicked: {e}"),
            }
        }
    }

    /// Finish the output stream normally.
    ///
    /// Drains merges and appends a finish marker unless one was already
    /// forwarded or the stream carries an error part.
    pub async fn close(mut self) -> Result<SessionSummary, RelayError> {
        self.drain_merges().await;

        if !self.outbox.finished() && !self.outbox.failed() {
            self.outbox.send(Part::Finish).await?;
        }

        Ok(self.summary())
    }

    /// Finish the output stream with an error part.
    ///
    /// Outstanding merges are cancelled first so nothing follows the error.
    /// A stream that already carries a finish or error part gets nothing
    /// further.
    pub async fn fail(mut self, error: &RelayError) -> SessionSummary {
        for handle in self.merges.drain(..) {
            handle.abort();
            let _ = handle.await;
        }

        if self.outbox.finished() {
            debug!(error = %error, "Stream already finished; error part not written");
        } else if !self.outbox.failed() {
            let part = Part::Error {
                error_text: error.to_string(),
            };
            if self.outbox.send(part).await.is_err() {
                debug!("Downstream gone before error part could be written");
            }
        }

        self.summary()
    }

    /// Stop without writing anything further; used when the reader is gone.
    pub fn abandon(mut self) -> SessionSummary {
        for handle in self.merges.drain(..) {
            handle.abort();
        }
        self.summary()
    }

    /// Sender clone used to observe the reader going away.
    pub(crate) fn disconnect_watch(&self) -> mpsc::Sender<Part> {
        self.outbox.tx.clone()
    }

    fn summary(&self) -> SessionSummary {
        SessionSummary {
            parts: self.outbox.state.parts.load(Ordering::Relaxed),
            channels: self.channels.len() + self.retired.len(),
            elapsed: self.opened_at.elapsed(),
        }
    }
}
