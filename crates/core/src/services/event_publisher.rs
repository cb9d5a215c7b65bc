//! Event publisher service.
//!
//! Provides an abstraction for publishing recomputed poll views to live
//! observers. The actual implementation is provided by the API crate's
//! WebSocket broadcast hub.

use async_trait::async_trait;
use quickpoll_common::AppResult;
use std::sync::Arc;

use crate::services::view::PollView;

/// Trait for publishing poll view updates.
///
/// This allows the poll service to push recomputed views without
/// directly depending on the WebSocket layer.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a view recomputed after a vote mutation.
    async fn publish_vote_update(&self, poll_id: &str, view: &PollView) -> AppResult<()>;

    /// Publish a view recomputed after a like toggle.
    async fn publish_like_update(&self, poll_id: &str, view: &PollView) -> AppResult<()>;
}

/// A no-op implementation of [`EventPublisher`] for testing or when
/// real-time updates are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish_vote_update(&self, _poll_id: &str, _view: &PollView) -> AppResult<()> {
        Ok(())
    }

    async fn publish_like_update(&self, _poll_id: &str, _view: &PollView) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;
