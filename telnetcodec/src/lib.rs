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

//! # Mudgate Telnet Codec
//!
//! A deliberately small Telnet implementation: the subset of the option
//! protocol a MUD connection front end actually needs, rather than full
//! RFC 854 machinery.
//!
//! ## Overview
//!
//! The crate covers four concerns:
//!
//! - **Byte constants** ([`consts`]): IAC and friends, the negotiated option
//!   codes, and the MSSP `VAR`/`VAL` markers.
//! - **Command building** ([`iac`], [`iac_sb`], [`IacPart`]): compose option
//!   commands from mixed-typed parts: raw bytes pass through, strings UTF-8
//!   encode, integers ASCII-decimal encode.
//! - **Input splitting** ([`split_opcode_from_input`]): a stream parser that
//!   separates in-band option sequences from user text. Negotiations,
//!   subnegotiation blocks, and two-byte commands land in the opcode buffer;
//!   everything else (including multi-byte UTF-8) is preserved as text, and
//!   `IAC IAC` unescapes to a literal data byte. Socket readers pair it with
//!   [`incomplete_tail_len`] (or [`utf8_tail_len`] for option-free streams)
//!   to hold back a sequence torn at a read boundary until the rest arrives.
//! - **Option handling** ([`handle_opcodes`], [`ServerStatus`]): dispatch of
//!   received opcodes, currently answering `DO MSSP` with the status
//!   subnegotiation block. Responses are written and flushed synchronously.
//!
//! ## Usage
//!
//! ```rust
//! use mudgate_telnetcodec::{advertise_features, echo_on, split_opcode_from_input};
//!
//! // Accept-time preamble: resume local echo, advertise MSSP.
//! let mut preamble = echo_on().to_vec();
//! preamble.extend_from_slice(&advertise_features());
//!
//! // Separate a probe from the text around it.
//! let (opcodes, text) = split_opcode_from_input(b"\xff\xfd\x46look\r\n");
//! assert_eq!(&opcodes[..], b"\xff\xfd\x46");
//! assert_eq!(text, "look\r\n");
//! ```
//!
//! The codec performs no negotiation state tracking: the front end offers a
//! fixed capability set on accept and toggles echo under upstream control,
//! which needs no Q-method state machine.

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

mod codec;
pub mod consts;
mod mssp;

pub use self::codec::{
    IacPart, advertise_features, echo_off, echo_on, go_ahead, handle_opcodes, iac, iac_sb,
    incomplete_tail_len, split_opcode_from_input, utf8_tail_len,
};
pub use self::mssp::ServerStatus;
