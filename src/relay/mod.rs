//! Partial-result relay.
//!
//! Multiplexes incremental values from upstream producers onto one ordered
//! stream of typed parts:
//! - [`part`]: Part model and wire shape
//! - [`ids`]: Channel identifiers and identifier generators
//! - [`session`]: Relay session (open / emit / merge / close)
//! - [`merge`]: Forwarding of foreign part streams into a session
//! - [`channel`]: Text and list accumulation onto channels
//! - [`runner`]: Running a workflow as a session on its own task
//! - [`log`]: Reader-side reconstruction of channel values

pub mod channel;
pub mod ids;
pub mod log;
pub mod merge;
pub mod part;
pub mod runner;
pub mod session;

use std::time::Duration;

use thiserror::Error;

use crate::producer::ProducerError;

pub use ids::{ChannelId, IdGenerator, SequentialIds, SharedIds, UuidIds};
pub use merge::MergeOptions;
pub use part::Part;
pub use runner::{spawn_session, SessionContext, Workflow};
pub use session::{PartStream, RelaySession, SessionSummary};

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("producer failed: {0}")]
    Producer(#[from] ProducerError),

    #[error("downstream disconnected")]
    Disconnected,

    #[error("session timed out after {0:?}")]
    Timeout(Duration),

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
