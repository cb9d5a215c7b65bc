//! HTTP API layer for quickpoll-rs.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: Account and poll APIs
//! - **Extractors**: Authentication
//! - **Middleware**: Bearer-token authentication
//! - **Streaming**: Per-poll WebSocket broadcast hub
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod streaming;

pub use endpoints::router;
pub use streaming::{poll_stream_handler, PollStreams, StreamUpdate};
