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

//! The JSON envelope exchanged with the game engine.
//!
//! Every frame is `{event, secret, payload?}`; the outbound heartbeat
//! additionally carries a top-level `tasks` count. The `secret` is a shared
//! symmetric token; frames that arrive without the right one are dropped by
//! the link reader and never dispatched.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event names used on the wire.
pub mod event {
    /// Front end → engine: a client connected
    pub const CONNECTION_CONNECTED: &str = "connection/connected";
    /// Front end → engine: a client disconnected
    pub const CONNECTION_DISCONNECTED: &str = "connection/disconnected";
    /// Front end → engine: one line of player input
    pub const PLAYER_INPUT: &str = "player/input";
    /// Both directions: liveness ping
    pub const HEARTBEAT: &str = "heartbeat";
    /// Front end → engine: soft-boot session snapshot
    pub const GAME_LOAD_PLAYERS: &str = "game/load_players";
    /// Engine → front end: text for a player
    pub const PLAYERS_OUTPUT: &str = "players/output";
    /// Engine → front end: a player authenticated
    pub const PLAYERS_SIGN_IN: &str = "players/sign-in";
    /// Engine → front end: a player quit
    pub const PLAYERS_SIGN_OUT: &str = "players/sign-out";
    /// Engine → front end: a login attempt failed terminally
    pub const PLAYERS_LOGIN_FAILED: &str = "players/login-failed";
    /// Engine → front end: non-I/O session control (echo toggling)
    pub const PLAYER_SESSION_COMMAND: &str = "player/session command";
    /// Engine → front end: the engine is about to restart
    pub const GAME_SOFTBOOT: &str = "game/softboot";
}

/// One wire frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name
    pub event: String,
    /// Shared symmetric token
    pub secret: String,
    /// Active task count, heartbeats only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<usize>,
    /// Event-specific payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Envelope {
    /// A payload-less frame.
    pub fn new(event: &str, secret: &str) -> Self {
        Self {
            event: event.to_string(),
            secret: secret.to_string(),
            tasks: None,
            payload: None,
        }
    }

    /// A frame carrying a typed payload.
    pub fn with_payload<T: Serialize>(event: &str, secret: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            event: event.to_string(),
            secret: secret.to_string(),
            tasks: None,
            payload: Some(serde_json::to_value(payload)?),
        })
    }

    /// The heartbeat frame, reporting the active task count.
    pub fn heartbeat(secret: &str, tasks: usize) -> Self {
        Self {
            event: event::HEARTBEAT.to_string(),
            secret: secret.to_string(),
            tasks: Some(tasks),
            payload: None,
        }
    }

    /// Whether this frame carries the expected secret.
    pub fn has_valid_secret(&self, secret: &str) -> bool {
        !secret.is_empty() && self.secret == secret
    }

    /// Deserialize the payload into an event-specific type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.payload.clone().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a received frame.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }
}

/// `connection/connected` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// Session id
    pub uuid: String,
    /// Peer address
    pub addr: String,
    /// Peer port
    pub port: u16,
    /// Terminal row count, when the transport reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u16>,
}

/// `connection/disconnected` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisconnectedPayload {
    /// Session id
    pub uuid: String,
    /// Peer address
    pub addr: String,
    /// Peer port
    pub port: u16,
}

/// `player/input` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerInputPayload {
    /// Session id
    pub uuid: String,
    /// Peer address
    pub addr: String,
    /// Peer port
    pub port: u16,
    /// The trimmed input line
    pub msg: String,
}

/// `players/output` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputPayload {
    /// Session id
    pub uuid: String,
    /// Text for the player
    pub message: String,
    /// `"true"` when the text ends a prompt
    #[serde(rename = "is prompt", default)]
    pub is_prompt: String,
}

impl OutputPayload {
    /// Whether the engine flagged this output as a prompt.
    pub fn prompt(&self) -> bool {
        self.is_prompt == "true"
    }
}

/// `players/sign-in` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignInPayload {
    /// Authenticated player name
    pub name: String,
    /// Session id
    pub uuid: String,
}

/// `players/sign-out` and `players/login-failed` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignOutPayload {
    /// Player name, when known
    #[serde(default)]
    pub name: String,
    /// Goodbye text delivered before the session closes
    pub message: String,
    /// Session id
    pub uuid: String,
}

/// `player/session command` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionCommandPayload {
    /// Session id
    pub uuid: String,
    /// `"do echo"` or `"dont echo"`
    pub command: String,
}

/// `game/softboot` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoftbootPayload {
    /// Seconds to wait before relaunching the engine
    pub wait_time: u64,
}

/// One `game/load_players` entry: `[name, addr, port]`.
pub type PlayerRecord = (String, String, u16);

/// `game/load_players` payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoadPlayersPayload {
    /// Session id → `[name, addr, port]`
    pub players: HashMap<String, PlayerRecord>,
}
