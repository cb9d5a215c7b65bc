//! WebSocket streaming API.
//!
//! Each poll has a set of live observers held by [`PollStreams`]. A
//! mutation recomputes the poll's view and pushes it to every observer
//! of that poll; observers of other polls are untouched. Delivery is
//! best effort: an observer whose channel has closed is pruned during
//! the broadcast pass. There is no buffering or replay, so a
//! reconnecting client fetches the current view over REST first.

#![allow(missing_docs)]

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use quickpoll_common::AppResult;
use quickpoll_core::{EventPublisher, PollView};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::middleware::AppState;

/// RFC 6455 close code sent when the handshake credential is rejected,
/// distinguishable from a normal close.
const POLICY_VIOLATION: u16 = 1008;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    pub token: Option<String>,
}

/// Server push frame.
///
/// The `type` tag is the key clients dispatch their UI refresh on; both
/// it and the `data` shape are part of the wire contract.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamUpdate {
    /// View recomputed after a vote was cast or changed.
    VoteUpdate(PollView),
    /// View recomputed after a like was toggled.
    LikeUpdate(PollView),
}

/// One attached observer: the sending half of its frame queue.
struct Observer {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    polls: HashMap<String, Vec<Observer>>,
}

/// Broadcast hub: owns the poll-id → observer-set mapping.
///
/// Only this type mutates the mapping; attach, detach and broadcast all
/// run under the registry lock so an observer is never visible to a
/// broadcast mid-attach or mid-detach.
#[derive(Clone, Default)]
pub struct PollStreams {
    inner: Arc<Mutex<Registry>>,
}

/// A live observer attached to exactly one poll for its lifetime.
///
/// Holds the receiving half of the frame queue plus a back-reference to
/// its poll id. When the registry prunes the observer, the sender is
/// dropped and [`ObserverHandle::recv`] returns `None`.
pub struct ObserverHandle {
    poll_id: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ObserverHandle {
    /// Receive the next frame, or `None` once revoked.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// The poll this observer is attached to.
    #[must_use]
    pub fn poll_id(&self) -> &str {
        &self.poll_id
    }
}

impl PollStreams {
    /// Create a new, empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new observer to a poll's stream.
    pub async fn attach(&self, poll_id: &str) -> ObserverHandle {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut registry = self.inner.lock().await;
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .polls
            .entry(poll_id.to_string())
            .or_default()
            .push(Observer { id, tx });

        ObserverHandle {
            poll_id: poll_id.to_string(),
            id,
            rx,
        }
    }

    /// Detach an observer.
    ///
    /// Idempotent: detaching an observer that is already gone is a
    /// no-op. The poll's entry is removed once its set empties.
    pub async fn detach(&self, handle: &ObserverHandle) {
        let mut registry = self.inner.lock().await;
        if let Some(observers) = registry.polls.get_mut(&handle.poll_id) {
            observers.retain(|o| o.id != handle.id);
            if observers.is_empty() {
                registry.polls.remove(&handle.poll_id);
            }
        }
    }

    /// Send an update to every observer attached to a poll.
    ///
    /// The frame is serialized once. Sends are independent: a dead
    /// observer cannot block delivery to the rest, and any observer
    /// whose channel has closed is removed in the same pass. Returns
    /// the number of observers reached.
    pub async fn broadcast(&self, poll_id: &str, update: &StreamUpdate) -> usize {
        let frame = match serde_json::to_string(update) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, poll_id = %poll_id, "Failed to serialize stream update");
                return 0;
            }
        };

        let mut registry = self.inner.lock().await;
        let Some(observers) = registry.polls.get_mut(poll_id) else {
            return 0;
        };

        observers.retain(|observer| observer.tx.send(frame.clone()).is_ok());

        let delivered = observers.len();
        if observers.is_empty() {
            registry.polls.remove(poll_id);
        }
        delivered
    }

    /// Number of observers currently attached to a poll.
    pub async fn observer_count(&self, poll_id: &str) -> usize {
        let registry = self.inner.lock().await;
        registry.polls.get(poll_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl EventPublisher for PollStreams {
    async fn publish_vote_update(&self, poll_id: &str, view: &PollView) -> AppResult<()> {
        let delivered = self
            .broadcast(poll_id, &StreamUpdate::VoteUpdate(view.clone()))
            .await;
        tracing::debug!(poll_id = %poll_id, delivered, "Broadcast vote update");
        Ok(())
    }

    async fn publish_like_update(&self, poll_id: &str, view: &PollView) -> AppResult<()> {
        let delivered = self
            .broadcast(poll_id, &StreamUpdate::LikeUpdate(view.clone()))
            .await;
        tracing::debug!(poll_id = %poll_id, delivered, "Broadcast like update");
        Ok(())
    }
}

/// WebSocket handler for a poll's live updates.
pub async fn poll_stream_handler(
    ws: WebSocketUpgrade,
    Path(poll_id): Path<String>,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, poll_id, query, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(mut socket: WebSocket, poll_id: String, query: StreamQuery, state: AppState) {
    // Handshake gate: the credential must verify before any attach
    let claims = match query.token.as_deref().map(|t| state.token_service.verify(t)) {
        Some(Ok(claims)) => claims,
        _ => {
            warn!(poll_id = %poll_id, "Streaming handshake rejected");
            let frame = CloseFrame {
                code: POLICY_VIOLATION,
                reason: "invalid credential".into(),
            };
            let _ = socket.send(Message::Close(Some(frame))).await;
            return;
        }
    };

    info!(poll_id = %poll_id, user_id = %claims.sub, "Streaming connection established");

    let mut handle = state.poll_streams.attach(&poll_id).await;
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        // Keepalive from the client
                        if text.as_str() == "ping"
                            && sender.send(Message::Text("pong".into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, poll_id = %poll_id, "WebSocket error");
                        break;
                    }
                }
            }

            // Forward frames fanned out by the registry
            update = handle.recv() => {
                match update {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    // Sender side dropped: the registry revoked this observer
                    None => break,
                }
            }
        }
    }

    state.poll_streams.detach(&handle).await;
    info!(poll_id = %poll_id, user_id = %claims.sub, "Streaming connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_view(poll_id: &str, total_votes: i64) -> PollView {
        PollView {
            id: poll_id.to_string(),
            title: "Favorite color?".to_string(),
            description: None,
            creator_id: "creator".to_string(),
            creator_username: "alice".to_string(),
            is_active: true,
            created_at: Utc::now().into(),
            options: vec![],
            total_votes,
            like_count: 0,
            user_voted: false,
            user_liked: false,
            user_vote_option_id: None,
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_only_target_poll() {
        let streams = PollStreams::new();

        let mut p1 = streams.attach("p").await;
        let mut p2 = streams.attach("p").await;
        let mut p3 = streams.attach("p").await;
        let mut q1 = streams.attach("q").await;

        let delivered = streams
            .broadcast("p", &StreamUpdate::VoteUpdate(test_view("p", 1)))
            .await;
        assert_eq!(delivered, 3);

        for observer in [&mut p1, &mut p2, &mut p3] {
            let frame = observer.rx.try_recv().unwrap();
            assert!(frame.contains("\"vote_update\""));
        }
        assert!(q1.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_per_connection_order_preserved() {
        let streams = PollStreams::new();
        let mut observer = streams.attach("p").await;

        streams
            .broadcast("p", &StreamUpdate::VoteUpdate(test_view("p", 1)))
            .await;
        streams
            .broadcast("p", &StreamUpdate::LikeUpdate(test_view("p", 1)))
            .await;

        let first = observer.rx.try_recv().unwrap();
        let second = observer.rx.try_recv().unwrap();
        assert!(first.contains("\"vote_update\""));
        assert!(second.contains("\"like_update\""));
    }

    #[tokio::test]
    async fn test_dead_observer_pruned_on_broadcast() {
        let streams = PollStreams::new();

        let alive = streams.attach("p").await;
        let dead = streams.attach("p").await;
        assert_eq!(streams.observer_count("p").await, 2);

        // Dropping the handle closes the receiving half; no explicit detach
        drop(dead);

        let delivered = streams
            .broadcast("p", &StreamUpdate::VoteUpdate(test_view("p", 1)))
            .await;
        assert_eq!(delivered, 1);
        assert_eq!(streams.observer_count("p").await, 1);

        drop(alive);
    }

    #[tokio::test]
    async fn test_detach_is_idempotent_and_drops_empty_set() {
        let streams = PollStreams::new();
        let handle = streams.attach("p").await;

        streams.detach(&handle).await;
        streams.detach(&handle).await;

        assert_eq!(streams.observer_count("p").await, 0);
        assert!(streams.inner.lock().await.polls.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_to_unknown_poll_is_noop() {
        let streams = PollStreams::new();

        let delivered = streams
            .broadcast("nobody-watching", &StreamUpdate::VoteUpdate(test_view("p", 0)))
            .await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_revoked_observer_recv_ends() {
        let streams = PollStreams::new();
        let mut observer = streams.attach("p").await;

        // Simulate the lazy-cleanup prune: empty the set by replacing the
        // registry entry, dropping the sender
        streams.inner.lock().await.polls.remove("p");

        assert!(observer.recv().await.is_none());
    }

    #[test]
    fn test_stream_update_wire_shape() {
        let update = StreamUpdate::VoteUpdate(test_view("p1", 2));
        let json = serde_json::to_value(&update).unwrap();

        assert_eq!(json["type"], "vote_update");
        assert_eq!(json["data"]["id"], "p1");
        assert_eq!(json["data"]["total_votes"], 2);

        let update = StreamUpdate::LikeUpdate(test_view("p1", 0));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["type"], "like_update");
    }
}
