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

//! The backend link: the single WebSocket to the game engine.
//!
//! Each accepted WebSocket gets a fresh [`BackendLink`] with its own
//! cancellation scope. The scope covers the link's heartbeat, reader, and
//! writer tasks and nothing else; session workers live outside it, which is
//! what keeps players connected across a backend bounce. When a new link
//! arrives it supersedes the old one: the predecessor's scope is cancelled,
//! the session registry is untouched, and the newcomer is greeted with a
//! `game/load_players` snapshot before any other frame.
//!
//! Frames that fail the secret check are dropped and logged; the link
//! survives them.

use crate::config::FrontendConfig;
use crate::envelope::{
    Envelope, OutputPayload, SessionCommandPayload, SignInPayload, SignOutPayload,
    SoftbootPayload, event,
};
use crate::error::Result;
use crate::message::SessionMessage;
use crate::registry::{SessionId, SessionRegistry};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

type WsSink = Arc<Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// One WebSocket connection from the game engine.
pub struct BackendLink {
    id: Uuid,
    connected: AtomicBool,
    last_heartbeat: std::sync::Mutex<Instant>,
    cancel: CancellationToken,
}

impl BackendLink {
    fn new(cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            connected: AtomicBool::new(true),
            last_heartbeat: std::sync::Mutex::new(Instant::now()),
            cancel,
        })
    }

    /// The link's opaque id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the link is still up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn terminate(&self) {
        self.connected.store(false, Ordering::Release);
        self.cancel.cancel();
    }

    /// Record an inbound heartbeat, returning the delta since the previous
    /// one.
    fn touch_heartbeat(&self) -> Duration {
        let mut last = self
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let delta = last.elapsed();
        *last = Instant::now();
        delta
    }

    fn heartbeat_age(&self) -> Duration {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }
}

/// The process-wide "current link" slot.
#[derive(Default)]
pub struct LinkRegistry {
    current: std::sync::Mutex<Option<(Uuid, CancellationToken)>>,
}

impl LinkRegistry {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a link as current, cancelling any predecessor. Sessions are
    /// never touched here.
    fn install(&self, link: &BackendLink) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((old_id, old_token)) = current.replace((link.id(), link.cancel.clone())) {
            tracing::info!(old = %old_id, new = %link.id(), "superseding backend link");
            old_token.cancel();
        }
    }

    /// Clear the slot if `id` is still the current link.
    fn clear(&self, id: Uuid) {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(*current, Some((current_id, _)) if current_id == id) {
            *current = None;
        }
    }

    /// Whether a link is currently installed.
    pub fn has_active(&self) -> bool {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

/// Accept loop for the game engine's WebSocket.
pub async fn serve_backend(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    links: Arc<LinkRegistry>,
    config: Arc<FrontendConfig>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                tracing::info!(%peer, "received websocket connection from game");
                let registry = registry.clone();
                let links = links.clone();
                let config = config.clone();
                let tracker = tracker.clone();
                let shutdown = shutdown.clone();
                tracker.clone().spawn(async move {
                    if let Err(error) =
                        handle_backend(stream, registry, links, config, tracker, shutdown).await
                    {
                        tracing::info!(%error, "backend link ended with error");
                    }
                });
            }
            Err(error) => {
                tracing::error!(%error, "websocket accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    tracing::info!("websocket accept loop terminated");
}

/// Handle one backend WebSocket to completion.
pub async fn handle_backend(
    stream: TcpStream,
    registry: Arc<SessionRegistry>,
    links: Arc<LinkRegistry>,
    config: Arc<FrontendConfig>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) -> Result<()> {
    let websocket = accept_async(stream).await?;
    let link = BackendLink::new(shutdown.child_token());
    links.install(&link);

    let (mut sink, source) = websocket.split();

    // Soft-boot rendezvous: a link that starts while sessions exist learns
    // about every one of them before any other frame.
    if !registry.is_empty() {
        let snapshot = registry.snapshot();
        tracing::info!(
            players = snapshot.players.len(),
            link = %link.id(),
            "sending load_players snapshot"
        );
        let envelope =
            Envelope::with_payload(event::GAME_LOAD_PLAYERS, registry.secret(), &snapshot)?;
        sink.send(Message::Text(envelope.to_json()?)).await?;
    }

    let sink: WsSink = Arc::new(Mutex::new(sink));

    let tasks = vec![
        tokio::spawn(heartbeat_loop(
            link.clone(),
            sink.clone(),
            registry.clone(),
            tracker.clone(),
            config.clone(),
        )),
        tokio::spawn(reader_loop(
            link.clone(),
            source,
            registry.clone(),
            tracker.clone(),
            config.clone(),
        )),
        tokio::spawn(writer_loop(link.clone(), sink.clone(), registry.clone())),
    ];

    // Whichever task finishes first cancels the link scope; the rest unwind
    // through it and are drained here.
    let (_, _, rest) = futures_util::future::select_all(tasks).await;
    link.terminate();
    for task in rest {
        let _ = task.await;
    }

    links.clear(link.id());
    tracing::info!(link = %link.id(), "closing websocket");
    Ok(())
}

/// Send a heartbeat every interval and enforce the backend liveness
/// deadline.
async fn heartbeat_loop(
    link: Arc<BackendLink>,
    sink: WsSink,
    registry: Arc<SessionRegistry>,
    tracker: TaskTracker,
    config: Arc<FrontendConfig>,
) {
    while link.is_connected() {
        if link.heartbeat_age() > config.backend_liveness_timeout {
            tracing::warn!(link = %link.id(), "backend heartbeat deadline missed; closing link");
            break;
        }

        let envelope = Envelope::heartbeat(registry.secret(), tracker.len());
        let json = match envelope.to_json() {
            Ok(json) => json,
            Err(error) => {
                tracing::warn!(%error, "failed to encode heartbeat");
                break;
            }
        };
        if sink.lock().await.send(Message::Text(json)).await.is_err() {
            tracing::info!(link = %link.id(), "heartbeat send failed");
            break;
        }

        tokio::select! {
            _ = link.cancel.cancelled() => break,
            _ = tokio::time::sleep(config.heartbeat_interval) => {}
        }
    }
    link.terminate();
}

/// Receive frames from the engine and dispatch them.
async fn reader_loop(
    link: Arc<BackendLink>,
    mut source: WsSource,
    registry: Arc<SessionRegistry>,
    tracker: TaskTracker,
    config: Arc<FrontendConfig>,
) {
    while link.is_connected() {
        let frame = tokio::select! {
            _ = link.cancel.cancelled() => break,
            frame = source.next() => frame,
        };
        match frame {
            None => {
                // EOF. The engine went away; soft-boot will re-attach.
                tracing::info!(link = %link.id(), "backend closed the websocket");
                break;
            }
            Some(Err(error)) => {
                tracing::info!(link = %link.id(), %error, "websocket read error");
                break;
            }
            Some(Ok(Message::Text(text))) => {
                dispatch(&text, &link, &registry, &tracker, &config);
            }
            Some(Ok(Message::Close(_))) => {
                tracing::info!(link = %link.id(), "backend sent close");
                break;
            }
            Some(Ok(_)) => {}
        }
    }
    link.terminate();
}

/// Drain the upstream queue onto the websocket.
async fn writer_loop(link: Arc<BackendLink>, sink: WsSink, registry: Arc<SessionRegistry>) {
    // Holding the receiver for the life of the link makes this the single
    // upstream consumer; a successor link takes the lock over, backlog and
    // all.
    let mut upstream = tokio::select! {
        _ = link.cancel.cancelled() => {
            link.terminate();
            return;
        }
        upstream = registry.bus().upstream().lock() => upstream,
    };

    while link.is_connected() {
        let envelope = tokio::select! {
            _ = link.cancel.cancelled() => break,
            envelope = upstream.recv() => envelope,
        };
        let Some(envelope) = envelope else { break };
        match envelope.to_json() {
            Ok(json) => {
                if sink.lock().await.send(Message::Text(json)).await.is_err() {
                    tracing::info!(link = %link.id(), "websocket send failed");
                    break;
                }
            }
            Err(error) => tracing::warn!(%error, "failed to encode upstream envelope"),
        }
    }
    link.terminate();
}

/// Parse and dispatch one inbound frame.
fn dispatch(
    text: &str,
    link: &BackendLink,
    registry: &Arc<SessionRegistry>,
    tracker: &TaskTracker,
    config: &Arc<FrontendConfig>,
) {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::warn!(%error, "dropping malformed frame from backend");
            return;
        }
    };
    if !envelope.has_valid_secret(registry.secret()) {
        tracing::warn!("no secret in message header, or wrong key; dropping frame");
        return;
    }

    match envelope.event.as_str() {
        event::HEARTBEAT => {
            let delta = link.touch_heartbeat();
            tracing::debug!(
                link = %link.id(),
                delta_secs = delta.as_secs_f64(),
                "heartbeat response from game"
            );
        }
        event::PLAYERS_OUTPUT => {
            let Ok(payload) = envelope.payload_as::<OutputPayload>() else {
                tracing::warn!("malformed players/output payload");
                return;
            };
            let Ok(id) = payload.uuid.parse::<SessionId>() else {
                return;
            };
            if registry.get(&id).is_some() {
                let prompt = payload.prompt();
                registry.send_to_session(
                    &id,
                    SessionMessage::Io {
                        text: payload.message,
                        is_prompt: prompt,
                    },
                );
            }
        }
        event::PLAYERS_SIGN_IN => {
            let Ok(payload) = envelope.payload_as::<SignInPayload>() else {
                tracing::warn!("malformed players/sign-in payload");
                return;
            };
            if let Ok(id) = payload.uuid.parse::<SessionId>() {
                tracing::debug!(player = %payload.name, session = %id, "sign-in received");
                registry.set_name(&id, &payload.name);
            }
        }
        event::PLAYERS_SIGN_OUT | event::PLAYERS_LOGIN_FAILED => {
            let Ok(payload) = envelope.payload_as::<SignOutPayload>() else {
                tracing::warn!("malformed sign-out payload");
                return;
            };
            let Ok(id) = payload.uuid.parse::<SessionId>() else {
                return;
            };
            if registry.get(&id).is_some() {
                tracing::debug!(player = %payload.name, session = %id, "sign-out received");
                registry.send_to_session(&id, SessionMessage::io(payload.message));
                registry.disconnect(&id);
            }
        }
        event::PLAYER_SESSION_COMMAND => {
            let Ok(payload) = envelope.payload_as::<SessionCommandPayload>() else {
                tracing::warn!("malformed session command payload");
                return;
            };
            let Ok(id) = payload.uuid.parse::<SessionId>() else {
                return;
            };
            let Some(session) = registry.get(&id) else {
                return;
            };
            if !session.kind().is_telnet_family() {
                return;
            }
            let bytes = match payload.command.as_str() {
                "dont echo" => mudgate_telnetcodec::echo_off(),
                "do echo" => mudgate_telnetcodec::echo_on(),
                _ => return,
            };
            registry.send_to_session(&id, SessionMessage::TelnetCommand(bytes));
        }
        event::GAME_SOFTBOOT => {
            let Ok(payload) = envelope.payload_as::<SoftbootPayload>() else {
                tracing::warn!("malformed softboot payload");
                return;
            };
            tracing::info!(wait_time = payload.wait_time, "softboot requested");
            // Deliberately outside the link scope: the engine severs right
            // after asking, and the relaunch must survive the teardown.
            tracker.spawn(softboot_game(
                payload.wait_time,
                config.softboot_command.clone(),
            ));
        }
        other => {
            tracing::debug!(event = other, "ignoring unknown event");
        }
    }
}

/// Wait out the grace period, then relaunch the game engine.
async fn softboot_game(wait_time: u64, command: Vec<String>) {
    tokio::time::sleep(Duration::from_secs(wait_time)).await;
    let Some((program, args)) = command.split_first() else {
        tracing::warn!("no softboot command configured; cannot relaunch game");
        return;
    };
    match tokio::process::Command::new(program).args(args).spawn() {
        Ok(child) => {
            // The child is reaped in the background when dropped.
            tracing::info!(pid = child.id(), "relaunched game engine");
        }
        Err(error) => {
            tracing::warn!(%error, %program, "failed to relaunch game engine");
        }
    }
}
