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

//! The generic per-session worker pair.
//!
//! Every transport funnels into [`run_session`]: one reader task and one
//! writer task per connection, supervised so that whichever finishes first
//! aborts its sibling, after which the session is unregistered and the
//! transport shut down. Reader termination is the normal disconnect path
//! (EOF or idle timeout); writer termination means a broken pipe and is
//! treated the same.
//!
//! The write half is shared through an async mutex: the writer task owns
//! the outbound queue, while the reader borrows the transport briefly to
//! answer Telnet option probes synchronously.

use crate::message::SessionMessage;
use crate::registry::{Session, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc};

/// Run a session to completion: register, spawn the reader/writer pair,
/// wait for the first to finish, then clean up.
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let outbound = registry.register(&session);
    let writer = Arc::new(Mutex::new(writer));

    let mut read_task = tokio::spawn(session_reader(
        reader,
        session.clone(),
        registry.clone(),
        writer.clone(),
        idle_timeout,
    ));
    let mut write_task = tokio::spawn(session_writer(
        outbound,
        session.clone(),
        writer.clone(),
    ));

    tokio::select! {
        _ = &mut read_task => write_task.abort(),
        _ = &mut write_task => read_task.abort(),
    }

    registry.unregister(&session);

    // Best-effort EOF toward the client; the peer may already be gone.
    let _ = writer.lock().await.shutdown().await;
    tracing::info!(session = %session.id(), "session closed");
}

/// Reader loop: pull bytes off the transport while the session is
/// connected, answer in-band option sequences, and forward each completed
/// line upstream as `player/input`.
async fn session_reader<R, W>(
    mut reader: R,
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
    writer: Arc<Mutex<W>>,
    idle_timeout: Duration,
) where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let telnet = session.kind().is_telnet_family();
    let mut chunk = [0u8; 1024];
    // Bytes held back from the previous read: a sequence torn at the chunk
    // boundary (a multi-byte character, or an unfinished IAC command) is
    // completed by the next read instead of being decoded in isolation.
    let mut carry: Vec<u8> = Vec::new();
    let mut pending = String::new();

    while session.is_connected() {
        let read = tokio::time::timeout(idle_timeout, reader.read(&mut chunk)).await;
        let count = match read {
            Err(_) => {
                tracing::info!(session = %session.id(), "idle timeout");
                session.set_connected(false);
                return;
            }
            Ok(Err(error)) => {
                tracing::info!(session = %session.id(), %error, "read error");
                session.set_connected(false);
                return;
            }
            Ok(Ok(0)) => {
                // EOF. Hard disconnect; an unterminated line is discarded.
                tracing::info!(session = %session.id(), "client EOF");
                session.set_connected(false);
                return;
            }
            Ok(Ok(count)) => count,
        };

        let mut data = std::mem::take(&mut carry);
        data.extend_from_slice(&chunk[..count]);
        let keep = if telnet {
            mudgate_telnetcodec::incomplete_tail_len(&data)
        } else {
            mudgate_telnetcodec::utf8_tail_len(&data)
        };
        carry = data.split_off(data.len() - keep);

        if telnet {
            let (opcodes, text) = mudgate_telnetcodec::split_opcode_from_input(&data);
            if !opcodes.is_empty() {
                let status = registry.mssp_status();
                let mut guard = writer.lock().await;
                if let Err(error) =
                    mudgate_telnetcodec::handle_opcodes(&opcodes, &status, &mut *guard).await
                {
                    tracing::info!(session = %session.id(), %error, "option reply failed");
                    session.set_connected(false);
                    return;
                }
            }
            pending.push_str(&text);
        } else {
            pending.push_str(&String::from_utf8_lossy(&data));
        }

        while let Some(position) = pending.find('\n') {
            let line: String = pending.drain(..=position).collect();
            registry.player_input(&session, line.trim());
        }
    }
}

/// Writer loop: drain the session's outbound queue onto the transport.
async fn session_writer<W>(
    mut outbound: mpsc::Receiver<SessionMessage>,
    session: Arc<Session>,
    writer: Arc<Mutex<W>>,
) where
    W: AsyncWrite + Unpin,
{
    let telnet = session.kind().is_telnet_family();

    while session.is_connected() {
        let Some(message) = outbound.recv().await else {
            // Queue dropped at unregistration.
            return;
        };

        let mut guard = writer.lock().await;
        let written = match message {
            SessionMessage::Io { text, is_prompt } => {
                let mut written = guard.write_all(text.as_bytes()).await;
                if written.is_ok() && is_prompt && telnet {
                    written = guard.write_all(&mudgate_telnetcodec::go_ahead()).await;
                }
                written
            }
            SessionMessage::TelnetCommand(bytes) => guard.write_all(&bytes).await,
            SessionMessage::SshCommand => Ok(()),
        };
        let flushed = match written {
            Ok(()) => guard.flush().await,
            Err(error) => Err(error),
        };
        if let Err(error) = flushed {
            tracing::info!(session = %session.id(), %error, "write failed");
            session.set_connected(false);
            return;
        }
    }
}
