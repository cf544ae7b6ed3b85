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

//! Telnet and Telnet-over-TLS listeners.
//!
//! Both transports perform the same accept dance: write `IAC WONT ECHO` so
//! the client echoes its own input, advertise the server capabilities, then
//! hand the connection to the generic session worker. The TLS variant wraps
//! the socket first; a handshake that misses its deadline never creates a
//! session.

use crate::config::FrontendConfig;
use crate::error::{FrontendError, Result};
use crate::registry::{Session, SessionRegistry, TransportKind};
use crate::session::run_session;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Accept loop for plain Telnet clients.
pub async fn serve_telnet(
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
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
                tracing::debug!(%peer, "accepted telnet connection");
                let registry = registry.clone();
                let idle_timeout = config.idle_timeout;
                tracker.spawn(async move {
                    if let Err(error) =
                        handle_telnet_client(stream, peer, registry, idle_timeout).await
                    {
                        tracing::info!(%peer, %error, "telnet session ended with error");
                    }
                });
            }
            Err(error) => {
                tracing::error!(%error, "telnet accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    tracing::info!("telnet accept loop terminated");
}

/// Handle one plain Telnet client to completion.
pub async fn handle_telnet_client(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();

    // The client keeps local echo; we advertise what we can negotiate.
    write_half
        .write_all(&mudgate_telnetcodec::echo_on())
        .await?;
    write_half
        .write_all(&mudgate_telnetcodec::advertise_features())
        .await?;
    write_half.flush().await?;

    let session = Session::new(peer, TransportKind::Telnet, None);
    run_session(read_half, write_half, session, registry, idle_timeout).await;
    Ok(())
}

/// Build the TLS acceptor: PEM chain and key, TLS 1.2 pinned to the two
/// ECDHE-AES256-GCM-SHA384 suites.
pub fn build_tls_acceptor(config: &FrontendConfig) -> Result<TlsAcceptor> {
    let mut cert_reader = BufReader::new(File::open(&config.tls_cert_path)?);
    let certs = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::io::Result<Vec<_>>>()?;
    if certs.is_empty() {
        return Err(FrontendError::KeyMaterial(format!(
            "no certificates in {}",
            config.tls_cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(&config.tls_key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or_else(|| {
        FrontendError::KeyMaterial(format!(
            "no private key in {}",
            config.tls_key_path.display()
        ))
    })?;

    let provider = rustls::crypto::CryptoProvider {
        cipher_suites: vec![
            rustls::crypto::ring::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
            rustls::crypto::ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        ],
        ..rustls::crypto::ring::default_provider()
    };
    let server_config = rustls::ServerConfig::builder_with_provider(Arc::new(provider))
        .with_protocol_versions(&[&rustls::version::TLS12])?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Accept loop for Telnet-over-TLS clients.
pub async fn serve_telnet_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    registry: Arc<SessionRegistry>,
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
                tracing::debug!(%peer, "accepted secure telnet connection");
                let acceptor = acceptor.clone();
                let registry = registry.clone();
                let idle_timeout = config.idle_timeout;
                let handshake_timeout = config.tls_handshake_timeout;
                tracker.spawn(async move {
                    if let Err(error) = handle_tls_client(
                        stream,
                        peer,
                        acceptor,
                        registry,
                        idle_timeout,
                        handshake_timeout,
                    )
                    .await
                    {
                        tracing::info!(%peer, %error, "secure telnet session ended with error");
                    }
                });
            }
            Err(error) => {
                tracing::error!(%error, "secure telnet accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
    tracing::info!("secure telnet accept loop terminated");
}

/// Handshake and handle one Telnet-over-TLS client.
async fn handle_tls_client(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<()> {
    let handshake = tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await;
    let tls_stream = match handshake {
        Ok(Ok(tls_stream)) => tls_stream,
        Ok(Err(error)) => {
            tracing::info!(%peer, %error, "TLS handshake failed");
            return Ok(());
        }
        Err(_) => {
            tracing::info!(%peer, "TLS handshake timed out");
            return Ok(());
        }
    };

    let (read_half, mut write_half) = tokio::io::split(tls_stream);
    write_half
        .write_all(&mudgate_telnetcodec::echo_on())
        .await?;
    write_half
        .write_all(&mudgate_telnetcodec::advertise_features())
        .await?;
    write_half.flush().await?;

    let session = Session::new(peer, TransportKind::TelnetTls, None);
    run_session(read_half, write_half, session, registry, idle_timeout).await;
    Ok(())
}
