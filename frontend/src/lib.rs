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

//! # Mudgate Front End
//!
//! A connection front end that decouples a text-based multi-user game engine
//! from the transports its players use. Clients connect over plain Telnet,
//! Telnet-over-TLS, or SSH; the front end multiplexes all of their I/O over
//! a single authenticated WebSocket to exactly one game engine process.
//!
//! # Architecture
//!
//! ```text
//! Telnet ┐                                      ┌ heartbeat
//! TLS    ├─ accept ─ Session (reader + writer)  ├ reader ──► dispatch
//! SSH    ┘              │            ▲          └ writer ◄── upstream queue
//!                       ▼            │
//!                 upstream queue   per-session queue
//!                       │            ▲
//!                       └──── BackendLink (one WebSocket) ──── game engine
//! ```
//!
//! The [`SessionRegistry`] is the authoritative table of live sessions and
//! the soft-boot source of truth: when the game engine restarts and its
//! replacement WebSocket connects, the new link is greeted with a
//! `game/load_players` snapshot derived from the registry, and every client
//! TCP session survives the bounce untouched.
//!
//! Failure isolation follows the task tree: errors in one session stay
//! inside that session's worker pair, and a dying backend link tears down
//! only the tasks in its own cancellation scope.

#![warn(
    clippy::cargo,
    missing_docs,
    clippy::pedantic,
    future_incompatible,
    rust_2018_idioms
)]
#![allow(
    clippy::option_if_let_else,
    clippy::module_name_repetitions,
    clippy::missing_errors_doc
)]

pub mod backend;
pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod keys;
pub mod message;
pub mod registry;
pub mod session;
pub mod ssh;
pub mod telnet;

pub use self::backend::{BackendLink, LinkRegistry};
pub use self::bus::{MessageBus, SessionSend};
pub use self::config::FrontendConfig;
pub use self::envelope::Envelope;
pub use self::error::{FrontendError, Result};
pub use self::keys::KeyStore;
pub use self::message::SessionMessage;
pub use self::registry::{Session, SessionId, SessionRegistry, TransportKind};
