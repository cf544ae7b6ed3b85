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

//! Command builders, the input splitter, and the received-opcode handler.
//!
//! The splitter is a byte-level stream parser: IAC-led sequences (two-byte
//! commands, three-byte negotiations, and `SB … IAC SE` blocks) are routed to
//! an opcode buffer while every other byte is preserved as text, so UTF-8
//! input passes through untouched. `IAC IAC` unescapes to a literal 0xFF data
//! byte.

use crate::consts;
use crate::mssp::ServerStatus;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// One piece of a Telnet command under construction.
///
/// Raw bytes pass through unchanged, strings are UTF-8 encoded, and integers
/// are encoded as their ASCII decimal representation (the MSSP convention for
/// numeric values).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IacPart {
    /// A single protocol byte (IAC, WILL, an option code, ...)
    Byte(u8),
    /// Raw bytes, passed through as-is
    Bytes(Bytes),
    /// Text, UTF-8 encoded
    Text(String),
    /// Integer, ASCII-decimal encoded
    Number(i64),
}

impl IacPart {
    fn put(&self, dst: &mut BytesMut) {
        match self {
            IacPart::Byte(byte) => dst.put_u8(*byte),
            IacPart::Bytes(bytes) => dst.put_slice(bytes),
            IacPart::Text(text) => dst.put_slice(text.as_bytes()),
            IacPart::Number(value) => dst.put_slice(value.to_string().as_bytes()),
        }
    }
}

impl From<u8> for IacPart {
    fn from(byte: u8) -> Self {
        IacPart::Byte(byte)
    }
}

impl From<&[u8]> for IacPart {
    fn from(bytes: &[u8]) -> Self {
        IacPart::Bytes(Bytes::copy_from_slice(bytes))
    }
}

impl From<&str> for IacPart {
    fn from(text: &str) -> Self {
        IacPart::Text(text.to_string())
    }
}

impl From<String> for IacPart {
    fn from(text: String) -> Self {
        IacPart::Text(text)
    }
}

impl From<i64> for IacPart {
    fn from(value: i64) -> Self {
        IacPart::Number(value)
    }
}

/// Build an `IAC`-prefixed command from mixed-typed parts.
pub fn iac(parts: &[IacPart]) -> Bytes {
    let mut buffer = BytesMut::with_capacity(parts.len() + 1);
    buffer.put_u8(consts::IAC);
    for part in parts {
        part.put(&mut buffer);
    }
    buffer.freeze()
}

/// Build a subnegotiation command, framing `parts` with `IAC SB … IAC SE`.
pub fn iac_sb(parts: &[IacPart]) -> Bytes {
    let mut buffer = BytesMut::with_capacity(parts.len() + 4);
    buffer.put_u8(consts::IAC);
    buffer.put_u8(consts::SB);
    for part in parts {
        part.put(&mut buffer);
    }
    buffer.put_u8(consts::IAC);
    buffer.put_u8(consts::SE);
    buffer.freeze()
}

/// Options advertised to every connecting client.
const CAPABILITIES: [u8; 1] = [consts::option::MSSP];

/// The feature advertisement block written on accept: `IAC WILL <option>` per
/// advertised capability.
pub fn advertise_features() -> Bytes {
    let mut features = BytesMut::with_capacity(CAPABILITIES.len() * 3);
    for capability in CAPABILITIES {
        features.put_u8(consts::IAC);
        features.put_u8(consts::WILL);
        features.put_u8(capability);
    }
    features.freeze()
}

/// `IAC WILL ECHO`: the server will echo, suppressing the client's local
/// echo. Used for password entry.
pub fn echo_off() -> Bytes {
    Bytes::from_static(&[consts::IAC, consts::WILL, consts::option::ECHO])
}

/// `IAC WONT ECHO`: the client resumes local echo.
pub fn echo_on() -> Bytes {
    Bytes::from_static(&[consts::IAC, consts::WONT, consts::option::ECHO])
}

/// `IAC GA`, appended after prompts for clients that want the delimiter.
pub fn go_ahead() -> Bytes {
    Bytes::from_static(&[consts::IAC, consts::GA])
}

/// Split raw client input into `(opcodes, text)`.
///
/// Opcodes keep their IAC prefixes so the handler can split on IAC later.
/// A sequence truncated at the end of the buffer is kept in the opcode
/// buffer rather than leaking protocol bytes into the text.
pub fn split_opcode_from_input(data: &[u8]) -> (Bytes, String) {
    let mut opcodes = BytesMut::new();
    let mut text = Vec::with_capacity(data.len());
    let mut index = 0;

    while index < data.len() {
        let byte = data[index];
        if byte != consts::IAC {
            if byte != consts::NUL {
                text.push(byte);
            }
            index += 1;
            continue;
        }
        match data.get(index + 1) {
            // Escaped data byte: IAC IAC is a literal 0xFF.
            Some(&consts::IAC) => {
                text.push(consts::IAC);
                index += 2;
            }
            Some(&command) if consts::NEGOTIATIONS.contains(&command) => {
                let end = (index + 3).min(data.len());
                opcodes.put_slice(&data[index..end]);
                index = end;
            }
            Some(&consts::SB) => {
                // Consume through IAC SE, or the rest of the buffer if the
                // block is truncated.
                let mut end = index + 2;
                while end < data.len() {
                    if data[end] == consts::IAC && data.get(end + 1) == Some(&consts::SE) {
                        end += 2;
                        break;
                    }
                    end += 1;
                }
                opcodes.put_slice(&data[index..end.min(data.len())]);
                index = end;
            }
            Some(_) => {
                opcodes.put_slice(&data[index..index + 2]);
                index += 2;
            }
            None => {
                opcodes.put_u8(consts::IAC);
                index += 1;
            }
        }
    }

    tracing::trace!(
        opcode_len = opcodes.len(),
        text_len = text.len(),
        "split client input"
    );
    (opcodes.freeze(), String::from_utf8_lossy(&text).into_owned())
}

/// Longest unterminated subnegotiation tail worth holding back. Real SB
/// blocks (NAWS, TTYPE replies) are a handful of bytes; anything bigger is
/// treated as garbage and released to the splitter.
const MAX_SB_CARRY: usize = 64;

/// Number of bytes at the end of `data` that start a multi-byte UTF-8
/// character whose continuation bytes have not arrived yet. Zero when the
/// buffer ends on a character boundary (or in bytes that can never decode,
/// which are left for the lossy conversion).
pub fn utf8_tail_len(data: &[u8]) -> usize {
    for back in 1..=data.len().min(3) {
        let byte = data[data.len() - back];
        if (0x80..=0xBF).contains(&byte) {
            // Continuation byte; keep looking for its leading byte.
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Number of bytes at the end of `data` that belong to a sequence the
/// splitter cannot process yet: an unfinished IAC command (a lone trailing
/// IAC, a negotiation missing its option byte, a short unterminated
/// subnegotiation) or an incomplete UTF-8 character.
///
/// Callers reading from a socket hold these bytes back and prepend them to
/// the next read, so neither option sequences nor multi-byte characters are
/// torn at chunk boundaries.
pub fn incomplete_tail_len(data: &[u8]) -> usize {
    let mut index = 0;
    let mut text_run = 0;

    while index < data.len() {
        if data[index] != consts::IAC {
            index += 1;
            continue;
        }
        match data.get(index + 1) {
            None => return data.len() - index,
            Some(&consts::IAC) => index += 2,
            Some(&command) if consts::NEGOTIATIONS.contains(&command) => {
                if index + 3 > data.len() {
                    return data.len() - index;
                }
                index += 3;
            }
            Some(&consts::SB) => {
                let mut end = index + 2;
                loop {
                    if end >= data.len() {
                        let tail = data.len() - index;
                        // An oversized unterminated block is released;
                        // the splitter will consume what it has.
                        return if tail <= MAX_SB_CARRY { tail } else { 0 };
                    }
                    if data[end] == consts::IAC && data.get(end + 1) == Some(&consts::SE) {
                        end += 2;
                        break;
                    }
                    end += 1;
                }
                index = end;
            }
            Some(_) => index += 2,
        }
        text_run = index;
    }

    // The buffer ends in plain text; only that run can tear a character.
    utf8_tail_len(&data[text_run..])
}

/// Handle opcodes extracted from a client stream.
///
/// Splits the buffer on IAC and dispatches each code sequence. `DO MSSP`
/// gets the status subnegotiation block; unknown sequences are ignored.
/// Responses are written and flushed before this returns.
pub async fn handle_opcodes<W>(
    opcodes: &[u8],
    status: &ServerStatus,
    writer: &mut W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut responded = false;
    for code in opcodes.split(|byte| *byte == consts::IAC) {
        if code == [consts::DO, consts::option::MSSP] {
            let response = status.mssp_response();
            tracing::debug!(len = response.len(), "responding to DO MSSP");
            writer.write_all(&response).await?;
            responded = true;
        } else if !code.is_empty() {
            tracing::trace!(?code, "ignoring unhandled opcode");
        }
    }
    if responded {
        writer.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iac_mixed_parts() {
        let built = iac(&[
            IacPart::from(consts::WILL),
            IacPart::from("AB"),
            IacPart::from(42i64),
        ]);
        assert_eq!(
            &built[..],
            &[consts::IAC, consts::WILL, b'A', b'B', b'4', b'2']
        );
    }

    #[test]
    fn test_iac_sb_framing() {
        let built = iac_sb(&[IacPart::from(consts::option::MSSP)]);
        assert_eq!(
            &built[..],
            &[
                consts::IAC,
                consts::SB,
                consts::option::MSSP,
                consts::IAC,
                consts::SE
            ]
        );
    }

    #[test]
    fn test_echo_and_go_ahead_bytes() {
        assert_eq!(&echo_off()[..], b"\xff\xfb\x01");
        assert_eq!(&echo_on()[..], b"\xff\xfc\x01");
        assert_eq!(&go_ahead()[..], b"\xff\xf9");
    }

    #[test]
    fn test_advertise_features_is_will_mssp() {
        assert_eq!(&advertise_features()[..], &[consts::IAC, consts::WILL, 70]);
    }

    #[test]
    fn test_split_plain_text_passes_through() {
        let (opcodes, text) = split_opcode_from_input(b"look\r\n");
        assert!(opcodes.is_empty());
        assert_eq!(text, "look\r\n");
    }

    #[test]
    fn test_split_extracts_negotiation() {
        let (opcodes, text) = split_opcode_from_input(b"\xff\xfd\x46look\r\n");
        assert_eq!(&opcodes[..], b"\xff\xfd\x46");
        assert_eq!(text, "look\r\n");
    }

    #[test]
    fn test_split_preserves_utf8() {
        let input = "héllo wörld\r\n".as_bytes();
        let (opcodes, text) = split_opcode_from_input(input);
        assert!(opcodes.is_empty());
        assert_eq!(text, "héllo wörld\r\n");
    }

    #[test]
    fn test_split_consumes_subnegotiation_block() {
        let mut input = vec![consts::IAC, consts::SB, consts::option::NAWS, 0, 80, 0, 24];
        input.extend_from_slice(&[consts::IAC, consts::SE]);
        input.extend_from_slice(b"hi");
        let (opcodes, text) = split_opcode_from_input(&input);
        assert_eq!(&opcodes[..], &input[..9]);
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_split_truncated_sequence_stays_out_of_text() {
        let (opcodes, text) = split_opcode_from_input(&[b'x', consts::IAC]);
        assert_eq!(&opcodes[..], &[consts::IAC]);
        assert_eq!(text, "x");
    }

    #[test]
    fn test_utf8_tail_detected() {
        assert_eq!(utf8_tail_len(b"look"), 0);
        assert_eq!(utf8_tail_len("héllo".as_bytes()), 0);
        // "é" is C3 A9; cut after the leading byte.
        assert_eq!(utf8_tail_len(b"h\xc3"), 1);
        // Three-byte char missing its last byte.
        assert_eq!(utf8_tail_len(b"x\xe2\x82"), 2);
        // Four-byte char missing one byte.
        assert_eq!(utf8_tail_len(b"\xf0\x9f\x92"), 3);
        // Stray continuation bytes can never complete; release them.
        assert_eq!(utf8_tail_len(b"\x80\x81\x82"), 0);
    }

    #[test]
    fn test_incomplete_tail_covers_iac_sequences() {
        // Lone IAC at the end.
        assert_eq!(incomplete_tail_len(b"look\xff"), 1);
        // Negotiation missing its option byte.
        assert_eq!(incomplete_tail_len(b"look\xff\xfd"), 2);
        // Complete negotiation leaves nothing behind.
        assert_eq!(incomplete_tail_len(b"look\xff\xfd\x46"), 0);
        // Escaped IAC is complete data.
        assert_eq!(incomplete_tail_len(b"a\xff\xff"), 0);
        // Unterminated subnegotiation is held back whole.
        assert_eq!(incomplete_tail_len(b"\xff\xfa\x1f\x00\x50"), 5);
    }

    #[test]
    fn test_incomplete_tail_ignores_text_before_full_sequence() {
        // The option byte of a complete negotiation may look like a UTF-8
        // leading byte; it must not be held back.
        assert_eq!(incomplete_tail_len(b"\xff\xfd\xc3"), 0);
        // Text after a complete sequence is still checked.
        assert_eq!(incomplete_tail_len(b"\xff\xfd\x46h\xc3"), 1);
    }

    #[tokio::test]
    async fn test_handle_do_mssp_writes_response() {
        let status = ServerStatus::default();
        let mut out = Vec::new();
        handle_opcodes(b"\xff\xfd\x46", &status, &mut out)
            .await
            .unwrap();
        assert_eq!(&out[..3], &[consts::IAC, consts::SB, consts::option::MSSP]);
        assert_eq!(&out[out.len() - 2..], &[consts::IAC, consts::SE]);
    }

    #[tokio::test]
    async fn test_handle_ignores_unknown_opcodes() {
        let status = ServerStatus::default();
        let mut out = Vec::new();
        handle_opcodes(b"\xff\xfd\x18\xff\xfb\x1f", &status, &mut out)
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
