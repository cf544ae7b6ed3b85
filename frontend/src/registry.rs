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

//! The session registry: the authoritative table of live client sessions.
//!
//! One registry value exists per process and is passed to every component by
//! handle. Sessions hold only their own id; the registry owns the
//! id → session mapping, the message bus, and the shared secret, and is the
//! soft-boot source of truth: a backend link that starts while the registry
//! is non-empty receives the `game/load_players` snapshot derived from it.

use crate::bus::{MessageBus, SessionSend};
use crate::config::FrontendConfig;
use crate::envelope::{
    ConnectedPayload, DisconnectedPayload, Envelope, LoadPlayersPayload, PlayerInputPayload, event,
};
use crate::message::SessionMessage;
use dashmap::DashMap;
use mudgate_telnetcodec::ServerStatus;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque session identifier, stable for the life of the TCP connection and
/// across backend restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Assign a fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(input)?))
    }
}

/// The transport a session arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain Telnet
    Telnet,
    /// Telnet over TLS
    TelnetTls,
    /// SSH session channel
    Ssh,
}

impl TransportKind {
    /// Whether this transport speaks in-band Telnet options.
    pub fn is_telnet_family(self) -> bool {
        matches!(self, TransportKind::Telnet | TransportKind::TelnetTls)
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Telnet => write!(f, "telnet"),
            TransportKind::TelnetTls => write!(f, "telnet-tls"),
            TransportKind::Ssh => write!(f, "ssh"),
        }
    }
}

/// One connected player.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    addr: String,
    port: u16,
    kind: TransportKind,
    rows: Option<u16>,
    name: RwLock<String>,
    connected: AtomicBool,
    logged_in: AtomicBool,
}

impl Session {
    /// Create a session for an accepted connection.
    pub fn new(peer: SocketAddr, kind: TransportKind, rows: Option<u16>) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            id: SessionId::new(),
            addr: peer.ip().to_string(),
            port: peer.port(),
            kind,
            rows,
            name: RwLock::new(String::new()),
            connected: AtomicBool::new(true),
            logged_in: AtomicBool::new(false),
        })
    }

    /// The session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Peer IP address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Peer port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Transport kind
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Terminal rows, when the transport reported them
    pub fn rows(&self) -> Option<u16> {
        self.rows
    }

    /// The authenticated player name; empty until sign-in.
    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Record the authenticated player name.
    pub fn set_name(&self, name: &str) {
        *self
            .name
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = name.to_string();
    }

    /// Whether the session is still connected.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Flip the connected flag; the reader and writer loops key off this.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Whether the backend reported a sign-in for this session.
    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::Acquire)
    }

    /// Record the sign-in state.
    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::Release);
    }
}

/// Process-wide session table plus the bus and shared secret.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, std::sync::Arc<Session>>,
    bus: MessageBus,
    secret: String,
    ports: Vec<u16>,
    started_at_epoch: u64,
}

impl SessionRegistry {
    /// Create the registry.
    pub fn new(secret: &str, config: &FrontendConfig) -> Self {
        let started_at_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        Self {
            sessions: DashMap::new(),
            bus: MessageBus::new(config.session_queue_depth),
            secret: secret.to_string(),
            ports: config.advertised_ports(),
            started_at_epoch,
        }
    }

    /// The shared symmetric token.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The message bus.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by id.
    pub fn get(&self, id: &SessionId) -> Option<std::sync::Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Register a new session: insert it, create its outbound queue, and
    /// notify the backend. The `connection/connected` envelope is enqueued
    /// before this returns, so it precedes any `player/input` from the
    /// session's reader.
    pub fn register(&self, session: &std::sync::Arc<Session>) -> mpsc::Receiver<SessionMessage> {
        tracing::info!(
            session = %session.id(),
            kind = %session.kind(),
            peer = %format!("{}:{}", session.addr(), session.port()),
            "registering client"
        );
        self.sessions.insert(session.id(), session.clone());
        let receiver = self.bus.create_queue(session.id());

        let payload = ConnectedPayload {
            uuid: session.id().to_string(),
            addr: session.addr().to_string(),
            port: session.port(),
            rows: session.rows(),
        };
        match Envelope::with_payload(event::CONNECTION_CONNECTED, &self.secret, &payload) {
            Ok(envelope) => self.bus.send_upstream(envelope),
            Err(error) => tracing::warn!(%error, "failed to build connected envelope"),
        }
        receiver
    }

    /// Unregister a session. Safe to call more than once: only the call
    /// that removes the entry emits `connection/disconnected`.
    pub fn unregister(&self, session: &Session) {
        session.set_connected(false);
        if self.sessions.remove(&session.id()).is_none() {
            return;
        }
        tracing::info!(session = %session.id(), "unregistering client");
        self.bus.remove_queue(&session.id());

        let payload = DisconnectedPayload {
            uuid: session.id().to_string(),
            addr: session.addr().to_string(),
            port: session.port(),
        };
        match Envelope::with_payload(event::CONNECTION_DISCONNECTED, &self.secret, &payload) {
            Ok(envelope) => self.bus.send_upstream(envelope),
            Err(error) => tracing::warn!(%error, "failed to build disconnected envelope"),
        }
    }

    /// Forward one trimmed line of player input upstream.
    pub fn player_input(&self, session: &Session, msg: &str) {
        let payload = PlayerInputPayload {
            uuid: session.id().to_string(),
            addr: session.addr().to_string(),
            port: session.port(),
            msg: msg.to_string(),
        };
        match Envelope::with_payload(event::PLAYER_INPUT, &self.secret, &payload) {
            Ok(envelope) => self.bus.send_upstream(envelope),
            Err(error) => tracing::warn!(%error, "failed to build input envelope"),
        }
    }

    /// Enqueue an outbound item for one session, applying the overflow
    /// policy: a full queue closes the session rather than blocking the
    /// dispatcher.
    pub fn send_to_session(&self, id: &SessionId, message: SessionMessage) {
        if self.bus.send_to_session(id, message) == SessionSend::Overflow {
            tracing::warn!(session = %id, "closing session after queue overflow");
            self.disconnect(id);
        }
    }

    /// Record the authenticated name the backend reported for a session.
    pub fn set_name(&self, id: &SessionId, name: &str) {
        if let Some(session) = self.get(id) {
            session.set_name(name);
            session.set_logged_in(true);
        }
    }

    /// Mark a session disconnected so its worker pair unwinds. The worker
    /// supervisor performs the unregistration.
    pub fn disconnect(&self, id: &SessionId) {
        if let Some(session) = self.get(id) {
            session.set_connected(false);
        }
    }

    /// The soft-boot snapshot: session id → `[name, addr, port]` for every
    /// live session.
    pub fn snapshot(&self) -> LoadPlayersPayload {
        let mut players = HashMap::new();
        for entry in self.sessions.iter() {
            let session = entry.value();
            players.insert(
                session.id().to_string(),
                (
                    session.name().to_lowercase(),
                    session.addr().to_string(),
                    session.port(),
                ),
            );
        }
        LoadPlayersPayload { players }
    }

    /// The MSSP self-description derived from live state.
    pub fn mssp_status(&self) -> ServerStatus {
        ServerStatus {
            players: self.len(),
            uptime: self.started_at_epoch,
            ports: self.ports.clone(),
            ..ServerStatus::default()
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("ports", &self.ports)
            .finish()
    }
}
