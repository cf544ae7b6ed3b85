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

//! The per-session outbound item.

use bytes::Bytes;

/// One item queued for delivery to a client session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionMessage {
    /// Game text for the player. Prompts are followed on the wire by
    /// `IAC GA` for Telnet-family transports.
    Io {
        /// The text payload
        text: String,
        /// Whether this ends a prompt
        is_prompt: bool,
    },
    /// Raw Telnet option bytes (echo toggling during password entry)
    TelnetCommand(Bytes),
    /// Reserved for session-level SSH commands
    SshCommand,
}

impl SessionMessage {
    /// Build a non-prompt text item.
    pub fn io(text: impl Into<String>) -> Self {
        SessionMessage::Io {
            text: text.into(),
            is_prompt: false,
        }
    }

    /// Whether this is normal I/O
    pub fn is_io(&self) -> bool {
        matches!(self, SessionMessage::Io { .. })
    }

    /// Whether this is a raw Telnet option command
    pub fn is_command_telnet(&self) -> bool {
        matches!(self, SessionMessage::TelnetCommand(_))
    }

    /// Whether this is I/O ending a prompt
    pub fn is_prompt(&self) -> bool {
        matches!(self, SessionMessage::Io { is_prompt: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_kinds() {
        let io = SessionMessage::io("A dark room.\r\n");
        assert!(io.is_io());
        assert!(!io.is_prompt());
        assert!(!io.is_command_telnet());

        let prompt = SessionMessage::Io {
            text: "> ".to_string(),
            is_prompt: true,
        };
        assert!(prompt.is_prompt());

        let command = SessionMessage::TelnetCommand(Bytes::from_static(b"\xff\xfb\x01"));
        assert!(command.is_command_telnet());
        assert!(!command.is_io());
    }
}
