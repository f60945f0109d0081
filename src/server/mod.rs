//! HTTP server exposing workflows as UI message streams.
//!
//! - [`api`]: Request types, router and route handlers
//! - [`streaming`]: SSE transport for part streams

pub mod api;
pub mod streaming;
