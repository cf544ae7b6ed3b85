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

//! Front end configuration.
//!
//! Listener enables, ports, key material paths, and the timeout regime, with
//! defaults matching the documented external interface: Telnet 4000 on
//! loopback, SSH 4001 on all interfaces, Telnet-TLS 4002 on loopback, and
//! the backend WebSocket on 8989 loopback.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Front end configuration
#[derive(Debug, Clone)]
pub struct FrontendConfig {
    /// Accept plain Telnet clients
    pub telnet_enabled: bool,
    /// Accept SSH clients
    pub ssh_enabled: bool,
    /// Accept Telnet-over-TLS clients
    pub telnet_tls_enabled: bool,

    /// Telnet listener port
    pub telnet_port: u16,
    /// SSH listener port
    pub ssh_port: u16,
    /// Telnet-over-TLS listener port
    pub telnet_tls_port: u16,
    /// Backend WebSocket listener port
    pub ws_port: u16,

    /// TLS certificate chain (PEM)
    pub tls_cert_path: PathBuf,
    /// TLS private key (PEM)
    pub tls_key_path: PathBuf,
    /// SSH host key (PEM, possibly passphrase-protected)
    pub ssh_host_key_path: PathBuf,

    /// Idle timeout for Telnet-family readers
    pub idle_timeout: Duration,
    /// TLS handshake deadline
    pub tls_handshake_timeout: Duration,
    /// SSH login timeout
    pub ssh_login_timeout: Duration,
    /// SSH keep-alive cadence
    pub ssh_keepalive: Duration,
    /// Heartbeat cadence on the backend link
    pub heartbeat_interval: Duration,
    /// How long the backend may go silent before the link is closed
    pub backend_liveness_timeout: Duration,

    /// Depth of each per-session outbound queue
    pub session_queue_depth: usize,

    /// Command line used to relaunch the game engine on soft-boot
    pub softboot_command: Vec<String>,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            telnet_enabled: true,
            ssh_enabled: true,
            telnet_tls_enabled: true,
            telnet_port: 4000,
            ssh_port: 4001,
            telnet_tls_port: 4002,
            ws_port: 8989,
            tls_cert_path: PathBuf::from("server_cert.pem"),
            tls_key_path: PathBuf::from("server_key.pem"),
            ssh_host_key_path: PathBuf::from("ssh_host_key"),
            idle_timeout: Duration::from_secs(3600),
            tls_handshake_timeout: Duration::from_secs(5),
            ssh_login_timeout: Duration::from_secs(3600),
            ssh_keepalive: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(10),
            backend_liveness_timeout: Duration::from_secs(90),
            session_queue_depth: 64,
            softboot_command: Vec::new(),
        }
    }
}

impl FrontendConfig {
    /// Set the Telnet listener port
    pub fn with_telnet_port(mut self, port: u16) -> Self {
        self.telnet_port = port;
        self
    }

    /// Set the SSH listener port
    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Set the Telnet-over-TLS listener port
    pub fn with_telnet_tls_port(mut self, port: u16) -> Self {
        self.telnet_tls_port = port;
        self
    }

    /// Set the backend WebSocket listener port
    pub fn with_ws_port(mut self, port: u16) -> Self {
        self.ws_port = port;
        self
    }

    /// Set the soft-boot relaunch command line
    pub fn with_softboot_command(mut self, command: Vec<String>) -> Self {
        self.softboot_command = command;
        self
    }

    /// Telnet bind address (loopback)
    pub fn telnet_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.telnet_port)
    }

    /// SSH bind address (all interfaces)
    pub fn ssh_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.ssh_port)
    }

    /// Telnet-over-TLS bind address (loopback)
    pub fn telnet_tls_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.telnet_tls_port)
    }

    /// Backend WebSocket bind address (loopback)
    pub fn ws_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.ws_port)
    }

    /// Ports advertised in the MSSP status block, in listener order.
    pub fn advertised_ports(&self) -> Vec<u16> {
        vec![self.telnet_port, self.ssh_port, self.telnet_tls_port]
    }
}
