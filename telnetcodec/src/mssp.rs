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

//! Mud Server Status Protocol support.
//!
//! MSSP (<https://tintin.sourceforge.io/protocols/mssp/>) is a subnegotiation
//! of the MSSP Telnet option: the server answers a `DO MSSP` probe with a
//! series of `VAR <name> VAL <value>` pairs describing itself. List-valued
//! variables repeat the `VAR name VAL element` pair per element.
//!
//! The variable schema is fixed; the handful of live values (name, player
//! count, uptime, ports) are filled in by the caller.

use crate::codec::{IacPart, iac_sb};
use crate::consts;
use bytes::Bytes;

/// Server self-description published to MSSP crawlers.
///
/// Everything not carried here is a fixed schema value emitted by
/// [`ServerStatus::tokens`].
#[derive(Clone, Debug)]
pub struct ServerStatus {
    /// Server name
    pub name: String,
    /// Current player count
    pub players: usize,
    /// Startup time, seconds since the Unix epoch
    pub uptime: u64,
    /// Codebase name
    pub codebase: String,
    /// Admin contact address
    pub contact: String,
    /// Listener ports, advertised as a repeated `PORT` variable
    pub ports: Vec<u16>,
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self {
            name: "Mudgate".to_string(),
            players: 0,
            uptime: 0,
            codebase: "Mudgate".to_string(),
            contact: "admin@mudgate.example".to_string(),
            ports: vec![4000, 4001, 4002],
        }
    }
}

fn push_pair(tokens: &mut Vec<IacPart>, key: &str, value: IacPart) {
    tokens.push(IacPart::Byte(consts::option::mssp::VAR));
    tokens.push(IacPart::from(key));
    tokens.push(IacPart::Byte(consts::option::mssp::VAL));
    tokens.push(value);
}

impl ServerStatus {
    /// The flat `VAR`/`VAL` token list for this status, led by the MSSP
    /// option byte. The reference schema with three ports encodes to 181
    /// tokens.
    pub fn tokens(&self) -> Vec<IacPart> {
        let mut tokens = vec![IacPart::Byte(consts::option::MSSP)];

        push_pair(&mut tokens, "NAME", IacPart::from(self.name.as_str()));
        push_pair(&mut tokens, "PLAYERS", IacPart::from(self.players as i64));
        push_pair(&mut tokens, "UPTIME", IacPart::from(self.uptime as i64));
        push_pair(&mut tokens, "CODEBASE", IacPart::from(self.codebase.as_str()));
        push_pair(&mut tokens, "CONTACT", IacPart::from(self.contact.as_str()));
        push_pair(&mut tokens, "CRAWL DELAY", IacPart::from(-1i64));
        push_pair(&mut tokens, "CREATED", IacPart::from(2002i64));
        push_pair(&mut tokens, "HOSTNAME", IacPart::from(-1i64));
        push_pair(&mut tokens, "ICON", IacPart::from(-1i64));
        push_pair(&mut tokens, "IP", IacPart::from(-1i64));
        push_pair(&mut tokens, "IPV6", IacPart::from(-1i64));
        push_pair(&mut tokens, "LANGUAGE", IacPart::from("English"));
        push_pair(&mut tokens, "LOCATION", IacPart::from("United States of America"));
        push_pair(&mut tokens, "MINIMUM AGE", IacPart::from(-1i64));
        for port in &self.ports {
            push_pair(&mut tokens, "PORT", IacPart::from(i64::from(*port)));
        }
        push_pair(&mut tokens, "REFERRAL", IacPart::from(-1i64));
        push_pair(&mut tokens, "WEBSITE", IacPart::from(-1i64));
        push_pair(&mut tokens, "FAMILY", IacPart::from("Custom"));
        push_pair(&mut tokens, "GENRE", IacPart::from("Fantasy"));
        push_pair(&mut tokens, "GAMEPLAY", IacPart::from("Adventure"));
        push_pair(&mut tokens, "STATUS", IacPart::from("Alpha"));
        push_pair(&mut tokens, "GAMESYSTEM", IacPart::from("None"));
        push_pair(&mut tokens, "INTERMUD", IacPart::from("Grapevine"));
        push_pair(&mut tokens, "SUBGENRE", IacPart::from("High Fantasy"));
        push_pair(&mut tokens, "AREAS", IacPart::from(1i64));
        push_pair(&mut tokens, "HELPFILES", IacPart::from(60i64));
        push_pair(&mut tokens, "MOBILES", IacPart::from(1i64));
        push_pair(&mut tokens, "OBJECTS", IacPart::from(1i64));
        push_pair(&mut tokens, "ROOMS", IacPart::from(20i64));
        push_pair(&mut tokens, "CLASSES", IacPart::from(5i64));
        push_pair(&mut tokens, "LEVELS", IacPart::from(50i64));
        push_pair(&mut tokens, "RACES", IacPart::from(5i64));
        push_pair(&mut tokens, "SKILLS", IacPart::from(1i64));
        push_pair(&mut tokens, "ANSI", IacPart::from(1i64));
        push_pair(&mut tokens, "MSP", IacPart::from(0i64));
        push_pair(&mut tokens, "UTF-8", IacPart::from(1i64));
        push_pair(&mut tokens, "VT100", IacPart::from(0i64));
        push_pair(&mut tokens, "XTERM 256 COLORS", IacPart::from(0i64));
        push_pair(&mut tokens, "XTERM TRUE COLORS", IacPart::from(0i64));
        push_pair(&mut tokens, "PAY TO PLAY", IacPart::from(0i64));
        push_pair(&mut tokens, "PAY FOR PERKS", IacPart::from(0i64));
        push_pair(&mut tokens, "HIRING BUILDERS", IacPart::from(0i64));
        push_pair(&mut tokens, "HIRING CODERS", IacPart::from(0i64));

        tokens
    }

    /// The full `IAC SB MSSP … IAC SE` response block.
    pub fn mssp_response(&self) -> Bytes {
        iac_sb(&self.tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_schema_token_count() {
        let status = ServerStatus::default();
        assert_eq!(status.tokens().len(), 181);
    }

    #[test]
    fn test_token_count_tracks_port_list() {
        let mut status = ServerStatus::default();
        status.ports = vec![4000];
        assert_eq!(status.tokens().len(), 181 - 8);
    }

    #[test]
    fn test_response_contains_name_variable() {
        let status = ServerStatus::default();
        let response = status.mssp_response();
        let needle = {
            let mut bytes = vec![consts::option::mssp::VAR];
            bytes.extend_from_slice(b"NAME");
            bytes.push(consts::option::mssp::VAL);
            bytes
        };
        assert!(
            response
                .windows(needle.len())
                .any(|window| window == needle)
        );
    }

    #[test]
    fn test_response_framing() {
        let response = ServerStatus::default().mssp_response();
        assert_eq!(
            &response[..3],
            &[consts::IAC, consts::SB, consts::option::MSSP]
        );
        assert_eq!(&response[response.len() - 2..], &[consts::IAC, consts::SE]);
    }

    #[test]
    fn test_stable_encoding_for_fixed_schema() {
        // Two identically-configured statuses must encode byte-for-byte
        // the same; the schema ordering is fixed, not map-iteration order.
        let first = ServerStatus::default().mssp_response();
        let second = ServerStatus::default().mssp_response();
        assert_eq!(first, second);
    }
}
