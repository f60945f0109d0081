//! part-relay: multiplexes streaming partial results onto typed UI message
//! parts.
//!
//! Upstream producers (language models, search) yield fragments; a relay
//! session accumulates them per named channel and writes full snapshots as
//! data parts onto one ordered output stream, which the server exposes over
//! Server-Sent Events.

pub mod config;
pub mod metrics;
pub mod producer;
pub mod relay;
pub mod server;
pub mod workflows;
