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

//! SSH listener.
//!
//! The listener is intentionally credential-less: any username with any
//! password (or none) is accepted, and authentication happens inside the
//! game. A successful session channel is converted into a byte stream and
//! handed to the same generic worker the Telnet transports use; SSH
//! sessions carry no in-band Telnet options.

use crate::config::FrontendConfig;
use crate::error::Result;
use crate::registry::{Session, SessionRegistry, TransportKind};
use crate::session::run_session;
use russh::keys::decode_secret_key;
use russh::server::{Auth, Config, Handler, Msg, Server};
use russh::{Channel, ChannelId, Pty};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Load and decrypt the SSH host key. Failures here are startup-fatal.
pub fn load_host_key(
    config: &FrontendConfig,
    passphrase: Option<&str>,
) -> Result<russh::keys::PrivateKey> {
    let pem = std::fs::read_to_string(&config.ssh_host_key_path)?;
    Ok(decode_secret_key(&pem, passphrase)?)
}

/// Run the SSH listener until shutdown.
pub async fn serve_ssh(
    registry: Arc<SessionRegistry>,
    config: Arc<FrontendConfig>,
    host_key: russh::keys::PrivateKey,
    tracker: TaskTracker,
    shutdown: CancellationToken,
) -> Result<()> {
    let ssh_config = Arc::new(Config {
        keys: vec![host_key],
        inactivity_timeout: Some(config.ssh_login_timeout),
        keepalive_interval: Some(config.ssh_keepalive),
        keepalive_max: 3,
        auth_rejection_time: Duration::from_secs(1),
        ..Config::default()
    });

    let mut listener = SshListener {
        registry,
        tracker,
        idle_timeout: config.idle_timeout,
    };

    let addr = config.ssh_addr();
    tokio::select! {
        _ = shutdown.cancelled() => {
            tracing::info!("ssh listener terminated");
            Ok(())
        }
        result = listener.run_on_address(ssh_config, addr) => {
            result?;
            Ok(())
        }
    }
}

struct SshListener {
    registry: Arc<SessionRegistry>,
    tracker: TaskTracker,
    idle_timeout: Duration,
}

impl Server for SshListener {
    type Handler = SshClient;

    fn new_client(&mut self, peer: Option<SocketAddr>) -> SshClient {
        match peer {
            Some(peer) => tracing::info!(%peer, "SSH connection received"),
            None => tracing::info!("SSH connection received (peer unknown)"),
        }
        SshClient {
            peer,
            registry: self.registry.clone(),
            tracker: self.tracker.clone(),
            idle_timeout: self.idle_timeout,
            channel: None,
            rows: None,
        }
    }

    fn handle_session_error(&mut self, error: <Self::Handler as Handler>::Error) {
        tracing::info!(%error, "SSH connection error");
    }
}

/// Per-connection SSH handler.
///
/// The session channel is stashed at open and the worker is spawned on the
/// shell request, so a preceding pty request can contribute the terminal
/// row count to the `connection/connected` payload.
struct SshClient {
    peer: Option<SocketAddr>,
    registry: Arc<SessionRegistry>,
    tracker: TaskTracker,
    idle_timeout: Duration,
    channel: Option<Channel<Msg>>,
    rows: Option<u16>,
}

impl SshClient {
    fn spawn_worker(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        let peer = self
            .peer
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
        let session = Session::new(peer, TransportKind::Ssh, self.rows);
        let (read_half, write_half) = tokio::io::split(channel.into_stream());
        self.tracker.spawn(run_session(
            read_half,
            write_half,
            session,
            self.registry.clone(),
            self.idle_timeout,
        ));
    }
}

impl Handler for SshClient {
    type Error = russh::Error;

    async fn auth_none(&mut self, user: &str) -> std::result::Result<Auth, Self::Error> {
        tracing::debug!(user, "ssh auth none accepted");
        Ok(Auth::Accept)
    }

    async fn auth_password(
        &mut self,
        user: &str,
        _password: &str,
    ) -> std::result::Result<Auth, Self::Error> {
        // Authentication is the game's job.
        tracing::debug!(user, "ssh auth password accepted");
        Ok(Auth::Accept)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut russh::server::Session,
    ) -> std::result::Result<bool, Self::Error> {
        self.channel = Some(channel);
        Ok(true)
    }

    async fn pty_request(
        &mut self,
        channel: ChannelId,
        _term: &str,
        _col_width: u32,
        row_height: u32,
        _pix_width: u32,
        _pix_height: u32,
        _modes: &[(Pty, u32)],
        session: &mut russh::server::Session,
    ) -> std::result::Result<(), Self::Error> {
        self.rows = u16::try_from(row_height).ok().filter(|rows| *rows > 0);
        session.channel_success(channel)?;
        Ok(())
    }

    async fn shell_request(
        &mut self,
        channel: ChannelId,
        session: &mut russh::server::Session,
    ) -> std::result::Result<(), Self::Error> {
        self.spawn_worker();
        session.channel_success(channel)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_host_key_is_startup_error() {
        let mut config = FrontendConfig::default();
        config.ssh_host_key_path = "/nonexistent/ssh_host_key".into();
        assert!(load_host_key(&config, None).is_err());
    }

    #[test]
    fn test_garbage_host_key_is_rejected() {
        let dir = std::env::temp_dir().join("mudgate-ssh-key-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("not_a_key");
        std::fs::write(&path, "this is not PEM").unwrap();

        let mut config = FrontendConfig::default();
        config.ssh_host_key_path = path;
        assert!(load_host_key(&config, None).is_err());
    }
}
