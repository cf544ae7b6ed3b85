//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! The message bus: one unbounded upstream queue plus a bounded outbound
//! queue per live session.
//!
//! The upstream queue is unbounded by design: a stalled backend is handled
//! by closing the link, not by backpressuring players. Its receiver sits
//! behind an async mutex so the active link's writer holds it for the
//! link's lifetime and a successor link inherits the backlog intact.
//!
//! Per-session queues are bounded. The dispatcher never blocks on them: a
//! write to an absent key is dropped with a warning, and a full queue
//! reports overflow so the caller can apply the close-session policy.

use crate::envelope::Envelope;
use crate::message::SessionMessage;
use crate::registry::SessionId;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};

/// Outcome of a non-blocking per-session enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSend {
    /// The item was queued for the session writer
    Queued,
    /// No queue exists for that id; the item was dropped
    UnknownSession,
    /// The queue is full; the session should be closed
    Overflow,
}

/// Queues between the client sessions and the backend link.
pub struct MessageBus {
    upstream_tx: mpsc::UnboundedSender<Envelope>,
    upstream_rx: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    queues: DashMap<SessionId, mpsc::Sender<SessionMessage>>,
    queue_depth: usize,
}

impl MessageBus {
    /// Create the bus with the given per-session queue depth.
    pub fn new(queue_depth: usize) -> Self {
        let (upstream_tx, upstream_rx) = mpsc::unbounded_channel();
        Self {
            upstream_tx,
            upstream_rx: Mutex::new(upstream_rx),
            queues: DashMap::new(),
            queue_depth,
        }
    }

    /// Enqueue an envelope for the backend.
    pub fn send_upstream(&self, envelope: Envelope) {
        // The receiver lives as long as the bus; this only fails during
        // process teardown.
        if self.upstream_tx.send(envelope).is_err() {
            tracing::warn!("upstream queue closed; dropping envelope");
        }
    }

    /// The upstream receiver. The backend link writer locks this for the
    /// life of the link; messages produced while no backend is connected
    /// accumulate until the next link drains them.
    pub fn upstream(&self) -> &Mutex<mpsc::UnboundedReceiver<Envelope>> {
        &self.upstream_rx
    }

    /// Create the outbound queue for a newly registered session, returning
    /// the receiver for its writer task.
    pub fn create_queue(&self, id: SessionId) -> mpsc::Receiver<SessionMessage> {
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.queues.insert(id, tx);
        rx
    }

    /// Drop a session's queue. Pending items are discarded with it.
    pub fn remove_queue(&self, id: &SessionId) {
        self.queues.remove(id);
    }

    /// Whether a queue exists for the session.
    pub fn has_queue(&self, id: &SessionId) -> bool {
        self.queues.contains_key(id)
    }

    /// Enqueue an item for one session without ever blocking.
    pub fn send_to_session(&self, id: &SessionId, message: SessionMessage) -> SessionSend {
        let Some(queue) = self.queues.get(id) else {
            tracing::warn!(session = %id, "dropping message for unknown session");
            return SessionSend::UnknownSession;
        };
        match queue.try_send(message) {
            Ok(()) => SessionSend::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(session = %id, "session queue overflow");
                SessionSend::Overflow
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(session = %id, "session queue closed");
                SessionSend::UnknownSession
            }
        }
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus")
            .field("sessions", &self.queues.len())
            .field("queue_depth", &self.queue_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::event;

    #[tokio::test]
    async fn test_upstream_order_preserved() {
        let bus = MessageBus::new(4);
        bus.send_upstream(Envelope::new(event::CONNECTION_CONNECTED, "X"));
        bus.send_upstream(Envelope::new(event::PLAYER_INPUT, "X"));

        let mut rx = bus.upstream().lock().await;
        assert_eq!(rx.recv().await.unwrap().event, "connection/connected");
        assert_eq!(rx.recv().await.unwrap().event, "player/input");
    }

    #[tokio::test]
    async fn test_send_to_unknown_session_drops() {
        let bus = MessageBus::new(4);
        let id = SessionId::new();
        assert_eq!(
            bus.send_to_session(&id, SessionMessage::io("lost")),
            SessionSend::UnknownSession
        );
    }

    #[tokio::test]
    async fn test_send_to_session_delivers_in_order() {
        let bus = MessageBus::new(4);
        let id = SessionId::new();
        let mut rx = bus.create_queue(id);

        bus.send_to_session(&id, SessionMessage::io("first"));
        bus.send_to_session(&id, SessionMessage::io("second"));

        assert_eq!(rx.recv().await.unwrap(), SessionMessage::io("first"));
        assert_eq!(rx.recv().await.unwrap(), SessionMessage::io("second"));
    }

    #[tokio::test]
    async fn test_overflow_reported_not_blocking() {
        let bus = MessageBus::new(1);
        let id = SessionId::new();
        let _rx = bus.create_queue(id);

        assert_eq!(
            bus.send_to_session(&id, SessionMessage::io("fits")),
            SessionSend::Queued
        );
        assert_eq!(
            bus.send_to_session(&id, SessionMessage::io("spills")),
            SessionSend::Overflow
        );
    }

    #[tokio::test]
    async fn test_remove_queue_discards_pending() {
        let bus = MessageBus::new(4);
        let id = SessionId::new();
        let _rx = bus.create_queue(id);
        bus.send_to_session(&id, SessionMessage::io("pending"));

        bus.remove_queue(&id);
        assert!(!bus.has_queue(&id));
        assert_eq!(
            bus.send_to_session(&id, SessionMessage::io("late")),
            SessionSend::UnknownSession
        );
    }
}
